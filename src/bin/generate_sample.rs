use std::fs::File;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::json;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }
}

struct VehicleRow {
    model_year: i64,
    make: String,
    model: String,
    vehicle_class: String,
    fuel_type: String,
    transmission: String,
    engine_size_l: f64,
    cylinders: i64,
    city_l_100_km: f64,
    highway_l_100_km: f64,
    combined_l_100_km: f64,
    co2_emissions_g_km: f64,
}

fn engine_size_class(engine_size_l: f64) -> &'static str {
    if engine_size_l < 2.0 {
        "small"
    } else if engine_size_l < 3.5 {
        "medium"
    } else {
        "large"
    }
}

fn cylinders_class(cylinders: i64) -> &'static str {
    if cylinders <= 4 {
        "4_or_less"
    } else if cylinders <= 6 {
        "5_to_6"
    } else {
        "more_than_6"
    }
}

fn vehicle_class_grouped(class: &str) -> &'static str {
    match class {
        "compact" | "mid-size" | "full-size" => "car",
        "suv: small" | "suv: standard" => "suv",
        "pickup truck" => "truck",
        _ => "other",
    }
}

/// CO2 per litre of fuel burned differs per fuel; diesel is densest.
fn fuel_co2_factor(code: &str) -> f64 {
    match code {
        "D" => 26.5,
        "E" => 17.0,
        "N" => 19.0,
        _ => 23.2,
    }
}

fn generate_rows(rng: &mut SimpleRng) -> Vec<VehicleRow> {
    let makes = [
        ("acura", 0.2),
        ("bmw", 0.9),
        ("chevrolet", 0.6),
        ("ford", 0.7),
        ("honda", -0.5),
        ("mazda", -0.4),
        ("mercedes-benz", 1.0),
        ("toyota", -0.6),
        ("volkswagen", -0.1),
        ("volvo", 0.3),
    ];
    let classes = [
        ("compact", 7.6, 1.6, 4i64),
        ("mid-size", 8.8, 2.2, 4),
        ("full-size", 10.2, 3.0, 6),
        ("suv: small", 9.6, 2.4, 4),
        ("suv: standard", 12.0, 3.6, 6),
        ("pickup truck", 13.4, 4.4, 8),
    ];
    let fuels = ["X", "X", "X", "Z", "Z", "D", "E", "N"];
    let transmissions = ["A6", "A8", "AS10", "AV", "M6"];

    let mut rows = Vec::new();
    for model_year in 2018..=2023i64 {
        for (make, make_bias) in &makes {
            for (class, base_city, engine_base, base_cyl) in &classes {
                for trim in 0..3 {
                    let fuel = (*rng.pick(&fuels)).to_string();
                    let transmission = (*rng.pick(&transmissions)).to_string();

                    let engine_size_l =
                        ((engine_base + rng.gauss(0.0, 0.4)).clamp(1.0, 6.5) * 10.0).round() / 10.0;
                    let cylinders = base_cyl + if rng.next_f64() > 0.7 { 2 } else { 0 };

                    // Consumption drifts down slightly with newer model years.
                    let year_drift = (model_year - 2018) as f64 * -0.08;
                    let city = (base_city + make_bias + engine_size_l * 0.4 + year_drift
                        + rng.gauss(0.0, 0.5))
                    .max(4.0);
                    let highway = (city * 0.72 + rng.gauss(0.0, 0.3)).max(3.5);
                    let combined = city * 0.55 + highway * 0.45;
                    let co2 = combined * fuel_co2_factor(&fuel) + rng.gauss(0.0, 6.0);

                    rows.push(VehicleRow {
                        model_year,
                        make: (*make).to_string(),
                        model: format!("{} {} {}", make, class, ["base", "sport", "touring"][trim]),
                        vehicle_class: (*class).to_string(),
                        fuel_type: fuel,
                        transmission,
                        engine_size_l,
                        cylinders,
                        city_l_100_km: (city * 10.0).round() / 10.0,
                        highway_l_100_km: (highway * 10.0).round() / 10.0,
                        combined_l_100_km: (combined * 10.0).round() / 10.0,
                        co2_emissions_g_km: co2.round(),
                    });
                }
            }
        }
    }
    rows
}

fn str_col(values: Vec<String>) -> ArrayRef {
    Arc::new(StringArray::from(values))
}

fn f64_col(values: Vec<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

fn i64_col(values: Vec<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

fn write_parquet(path: &str, schema: Schema, columns: Vec<ArrayRef>) {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), columns).expect("building record batch");
    let file = File::create(path).expect("creating output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("creating parquet writer");
    writer.write(&batch).expect("writing record batch");
    writer.close().expect("closing parquet writer");
    println!("wrote {path} ({} rows)", batch.num_rows());
}

fn write_consolidated(rows: &[VehicleRow]) {
    let schema = Schema::new(vec![
        Field::new("model_year", DataType::Int64, false),
        Field::new("make", DataType::Utf8, false),
        Field::new("model", DataType::Utf8, false),
        Field::new("vehicle_class", DataType::Utf8, false),
        Field::new("engine_size_l", DataType::Float64, false),
        Field::new("cylinders", DataType::Int64, false),
        Field::new("fuel_type", DataType::Utf8, false),
        Field::new("city_l_100_km", DataType::Float64, false),
        Field::new("highway_l_100_km", DataType::Float64, false),
        Field::new("combined_l_100_km", DataType::Float64, false),
        Field::new("combined_mpg", DataType::Float64, false),
        Field::new("co2_emissions_g_km", DataType::Float64, false),
        Field::new("co2_rating", DataType::Int64, false),
        Field::new("smog_rating", DataType::Int64, false),
    ]);

    let rating = |co2: f64| ((600.0 - co2) / 60.0).clamp(1.0, 10.0).round() as i64;
    let columns = vec![
        i64_col(rows.iter().map(|r| r.model_year).collect()),
        str_col(rows.iter().map(|r| r.make.clone()).collect()),
        str_col(rows.iter().map(|r| r.model.clone()).collect()),
        str_col(rows.iter().map(|r| r.vehicle_class.clone()).collect()),
        f64_col(rows.iter().map(|r| r.engine_size_l).collect()),
        i64_col(rows.iter().map(|r| r.cylinders).collect()),
        str_col(rows.iter().map(|r| r.fuel_type.clone()).collect()),
        f64_col(rows.iter().map(|r| r.city_l_100_km).collect()),
        f64_col(rows.iter().map(|r| r.highway_l_100_km).collect()),
        f64_col(rows.iter().map(|r| r.combined_l_100_km).collect()),
        f64_col(
            rows.iter()
                .map(|r| (235.2 / r.combined_l_100_km * 10.0).round() / 10.0)
                .collect(),
        ),
        f64_col(rows.iter().map(|r| r.co2_emissions_g_km).collect()),
        i64_col(rows.iter().map(|r| rating(r.co2_emissions_g_km)).collect()),
        i64_col(rows.iter().map(|r| rating(r.co2_emissions_g_km * 1.1)).collect()),
    ];
    write_parquet("data/consolidated_vehicles.parquet", schema, columns);
}

fn write_treated(rows: &[VehicleRow]) {
    let schema = Schema::new(vec![
        Field::new("model_year", DataType::Int64, false),
        Field::new("transmission", DataType::Utf8, false),
        Field::new("vehicle_class_grouped", DataType::Utf8, false),
        Field::new("fuel_type", DataType::Utf8, false),
        Field::new("engine_size_l_class", DataType::Utf8, false),
        Field::new("cylinders_class", DataType::Utf8, false),
        Field::new("city_l_100_km", DataType::Float64, false),
        Field::new("highway_l_100_km", DataType::Float64, false),
        Field::new("combined_l_100_km", DataType::Float64, false),
    ]);

    let columns = vec![
        i64_col(rows.iter().map(|r| r.model_year).collect()),
        str_col(rows.iter().map(|r| r.transmission.clone()).collect()),
        str_col(
            rows.iter()
                .map(|r| vehicle_class_grouped(&r.vehicle_class).to_string())
                .collect(),
        ),
        str_col(rows.iter().map(|r| r.fuel_type.clone()).collect()),
        str_col(
            rows.iter()
                .map(|r| engine_size_class(r.engine_size_l).to_string())
                .collect(),
        ),
        str_col(
            rows.iter()
                .map(|r| cylinders_class(r.cylinders).to_string())
                .collect(),
        ),
        f64_col(rows.iter().map(|r| r.city_l_100_km).collect()),
        f64_col(rows.iter().map(|r| r.highway_l_100_km).collect()),
        f64_col(rows.iter().map(|r| r.combined_l_100_km).collect()),
    ];
    write_parquet("data/treated_vehicles.parquet", schema, columns);
}

fn write_model() {
    // Hand-specified coefficients roughly matching the generated data.
    let model = json!({
        "feature_order": [
            "model_year",
            "transmission",
            "vehicle_class_grouped",
            "fuel_type",
            "engine_size_l_class",
            "cylinders_class",
            "city_l_100_km",
            "highway_l_100_km",
            "combined_l_100_km"
        ],
        "intercept": 14.0,
        "terms": [
            { "kind": "numeric", "feature": "model_year", "coefficient": 0.0 },
            { "kind": "numeric", "feature": "city_l_100_km", "coefficient": 1.2 },
            { "kind": "numeric", "feature": "highway_l_100_km", "coefficient": 0.8 },
            { "kind": "numeric", "feature": "combined_l_100_km", "coefficient": 20.5 },
            {
                "kind": "one_hot",
                "feature": "transmission",
                "weights": { "A6": 1.0, "A8": 0.4, "AS10": -0.2, "AV": -1.4, "M6": 0.6 }
            },
            {
                "kind": "one_hot",
                "feature": "vehicle_class_grouped",
                "weights": { "car": -3.0, "suv": 2.4, "truck": 6.8, "other": 0.0 }
            },
            {
                "kind": "one_hot",
                "feature": "fuel_type",
                "weights": { "X": 0.0, "Z": 1.8, "D": 28.0, "E": -48.0, "N": -32.0 }
            },
            {
                "kind": "one_hot",
                "feature": "engine_size_l_class",
                "weights": { "small": -4.2, "medium": 0.6, "large": 5.4 }
            },
            {
                "kind": "one_hot",
                "feature": "cylinders_class",
                "weights": { "4_or_less": -2.6, "5_to_6": 0.8, "more_than_6": 4.2 }
            }
        ]
    });

    let path = "data/emission_model.json";
    std::fs::write(path, serde_json::to_string_pretty(&model).expect("serializing model"))
        .expect("writing model file");
    println!("wrote {path}");
}

fn main() {
    std::fs::create_dir_all("data").expect("creating data directory");

    let mut rng = SimpleRng::new(42);
    let rows = generate_rows(&mut rng);

    write_consolidated(&rows);
    write_treated(&rows);
    write_model();
}
