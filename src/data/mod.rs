/// Data layer: core types, loading, preparation, filtering, aggregation.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (memoized per path)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ prepare   │  display columns + fuel relabeling
///   └──────────┘
///        │
///        ├──────────────────────┐
///        ▼                      ▼
///   ┌──────────┐          ┌───────────┐
///   │  filter   │          │ aggregate  │
///   │ classify →│          │ means,     │
///   │ predicates│          │ scatter,   │
///   └──────────┘          │ treemap    │
///                          └───────────┘
/// ```
pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod prepare;
