use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    pub total_operations: usize,
    pub passed: usize,
    pub failed: usize,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2_or_dash")]
    pub min_pass_time_ms: Option<f64>,
    #[tabled(display = "float2_or_dash")]
    pub max_pass_time_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub total_duration_ms: f64,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn float2_or_dash(n: &Option<f64>) -> String {
    match n {
        Some(n) => float2(n),
        None => "-".to_string(),
    }
}
