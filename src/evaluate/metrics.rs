use crate::model::Report;
use crate::recommend::Recommendation;

pub fn is_relevant(query: &Report, candidate: &Report) -> bool {
    query.assigned_to == candidate.assigned_to
}

/// 1.0 when at least `k` items came back.
pub fn feedback(returned: usize, k: usize) -> f64 {
    if returned >= k { 1.0 } else { 0.0 }
}

pub fn precision(query: &Report, recommendations: &[Recommendation]) -> f64 {
    if recommendations.is_empty() {
        return 0.0;
    }

    let relevant = recommendations
        .iter()
        .filter(|item| is_relevant(query, &item.report))
        .count();
    relevant as f64 / recommendations.len() as f64
}

pub fn likelihood(query: &Report, recommendations: &[Recommendation]) -> f64 {
    if recommendations
        .iter()
        .any(|item| is_relevant(query, &item.report))
    {
        1.0
    } else {
        0.0
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
