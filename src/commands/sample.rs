use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{Datelike, SecondsFormat, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::cli::{SampleArgs, StoreArgs};
use crate::commands::open_store;
use crate::model::{BugId, Report, SampleManifest};
use crate::util::{ensure_directory, manifest_path, now_utc_string, run_id, write_json_pretty};

#[derive(Debug, Default, PartialEq)]
struct SampleDistribution {
    years: BTreeMap<i32, usize>,
    products: BTreeMap<String, usize>,
    components: BTreeMap<String, usize>,
}

pub fn run(args: SampleArgs, store_args: &StoreArgs) -> Result<()> {
    if args.created_after >= args.created_before {
        bail!(
            "empty sampling window: {} is not before {}",
            args.created_after,
            args.created_before
        );
    }

    let generated_at = now_utc_string();
    let run_id = run_id("sample");
    let seed = args
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis().unsigned_abs());
    let manifest_dir = store_args.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let store = open_store(store_args)?;
    let pool = store
        .find_sample_pool(args.created_after, args.created_before)
        .context("failed to load sample pool")?;
    let pool_size = pool.len();
    if pool_size < args.size {
        warn!(
            requested = args.size,
            available = pool_size,
            "sample pool smaller than requested size"
        );
    }

    let sample = draw_sample(pool, args.size, seed);
    let mut bg_numbers = sample
        .iter()
        .map(|report| report.bg_number)
        .collect::<Vec<BugId>>();
    bg_numbers.sort_unstable();

    let sampled = store
        .mark_sample(&bg_numbers)
        .context("failed to flag sampled reports")?;
    let counts = distribution(&sample);
    info!(
        sampled,
        pool_size,
        seed,
        years = ?counts.years,
        "sample flagged"
    );

    let manifest = SampleManifest {
        manifest_version: 1,
        run_id,
        generated_at,
        requested_size: args.size,
        pool_size,
        sampled,
        seed,
        creation_time_start: args
            .created_after
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        creation_time_end: args
            .created_before
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        years: counts.years,
        products: counts.products,
        components: counts.components,
        bg_numbers,
    };
    let manifest_path = manifest_path(&manifest_dir, "sample");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), sampled, "sample completed");
    Ok(())
}

fn draw_sample(mut pool: Vec<Report>, size: usize, seed: u64) -> Vec<Report> {
    let mut rng = StdRng::seed_from_u64(seed);
    pool.shuffle(&mut rng);
    pool.truncate(size);
    pool
}

fn distribution(sample: &[Report]) -> SampleDistribution {
    let mut out = SampleDistribution::default();
    for report in sample {
        *out.years.entry(report.creation_time.year()).or_insert(0) += 1;
        *out.products.entry(report.product.clone()).or_insert(0) += 1;
        *out.components.entry(report.component.clone()).or_insert(0) += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generated_corpus;

    fn ids(reports: &[Report]) -> Vec<BugId> {
        reports.iter().map(|report| report.bg_number).collect()
    }

    #[test]
    fn same_seed_draws_same_sample() {
        let corpus = generated_corpus(50, 5);
        let first = draw_sample(corpus.clone(), 10, 42);
        let again = draw_sample(corpus.clone(), 10, 42);
        let other = draw_sample(corpus, 10, 43);

        assert_eq!(ids(&first), ids(&again));
        assert_ne!(ids(&first), ids(&other));
    }

    #[test]
    fn sample_has_no_duplicates_and_is_capped_by_pool() {
        let corpus = generated_corpus(12, 5);
        let mut drawn = ids(&draw_sample(corpus, 100, 7));
        assert_eq!(drawn.len(), 12);
        drawn.sort_unstable();
        drawn.dedup();
        assert_eq!(drawn.len(), 12);
    }

    #[test]
    fn zero_seed_is_a_valid_seed() {
        let corpus = generated_corpus(30, 5);
        let drawn = draw_sample(corpus, 30, 0);
        assert_ne!(ids(&drawn), (1..=30).collect::<Vec<BugId>>());
    }

    #[test]
    fn distribution_counts_years_products_and_components() {
        let corpus = generated_corpus(40, 9);
        let counts = distribution(&corpus);

        assert_eq!(counts.years.values().sum::<usize>(), 40);
        assert_eq!(counts.products.values().sum::<usize>(), 40);
        assert_eq!(counts.components.values().sum::<usize>(), 40);
        assert!(counts.years.keys().all(|year| (2008..=2012).contains(year)));
    }
}
