use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::info;

use crate::cli::{RecommendArgs, StoreArgs};
use crate::commands::{build_recommender, open_store};
use crate::evaluate::{is_relevant, likelihood, precision};
use crate::model::{BugId, Report};
use crate::recommend::{Recommendation, ScoringConfig};
use crate::store::ReportStore;

#[derive(Debug, Serialize)]
struct RecommendResponse {
    query: BugId,
    assigned_to: String,
    k: usize,
    strategy: &'static str,
    source: &'static str,
    returned: usize,
    precision: f64,
    likelihood: f64,
    recommendations: Vec<RecommendationItem>,
}

#[derive(Debug, Serialize)]
struct RecommendationItem {
    rank: usize,
    bg_number: BugId,
    assigned_to: String,
    relevant: bool,
    score: f64,
    cos_similarity_tfidf: f64,
    cos_similarity_word_embeddings: f64,
    categoric_similarity: f64,
    product: String,
    component: String,
    summary: String,
}

pub fn run(args: RecommendArgs, store_args: &StoreArgs) -> Result<()> {
    let config = ScoringConfig::load(args.scoring_config.as_deref())?;
    let store = open_store(store_args)?;
    let query = store
        .load_report(args.bug)
        .with_context(|| format!("failed to load report {}", args.bug))?
        .ok_or_else(|| anyhow!("report {} not found", args.bug))?;

    let recommender = build_recommender(&store, args.source, config);
    let recommendations = recommender
        .get_recommendations(&query, args.k, args.strategy)
        .with_context(|| format!("failed to recommend for report {}", query.bg_number))?;

    info!(
        query = query.bg_number,
        k = args.k,
        strategy = args.strategy.as_str(),
        source = recommender.source_name(),
        returned = recommendations.len(),
        "recommendations ready"
    );

    let response = RecommendResponse {
        query: query.bg_number,
        assigned_to: query.assigned_to.clone(),
        k: args.k,
        strategy: args.strategy.as_str(),
        source: recommender.source_name(),
        returned: recommendations.len(),
        precision: precision(&query, &recommendations),
        likelihood: likelihood(&query, &recommendations),
        recommendations: items(&query, &recommendations),
    };

    if args.json {
        write_json_response(&response)
    } else {
        write_text_response(&query, &response)
    }
}

fn items(query: &Report, recommendations: &[Recommendation]) -> Vec<RecommendationItem> {
    recommendations
        .iter()
        .map(|item| RecommendationItem {
            rank: item.rank,
            bg_number: item.report.bg_number,
            assigned_to: item.report.assigned_to.clone(),
            relevant: is_relevant(query, &item.report),
            score: item.score,
            cos_similarity_tfidf: item.signals.tfidf,
            cos_similarity_word_embeddings: item.signals.embedding,
            categoric_similarity: item.signals.categoric,
            product: item.report.product.clone(),
            component: item.report.component.clone(),
            summary: item.report.summary.clone(),
        })
        .collect()
}

fn write_json_response(response: &RecommendResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize recommendation json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(query: &Report, response: &RecommendResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Query: {} assigned_to={} prod={} comp={} summ={}",
        query.bg_number, query.assigned_to, query.product, query.component, query.summary
    )?;
    writeln!(
        output,
        "Strategy: {} source={} k={} returned={} prc={:.3} lkh={:.1}",
        response.strategy,
        response.source,
        response.k,
        response.returned,
        response.precision,
        response.likelihood,
    )?;

    for item in &response.recommendations {
        writeln!(
            output,
            "{} - {},rlv={}, scr={:.4}, comp={}, prod={}, summ={}",
            item.rank,
            item.bg_number,
            u8::from(item.relevant),
            item.score,
            item.component,
            item.product,
            item.summary,
        )?;
    }

    output.flush()?;
    Ok(())
}
