use textclust::{BasicCleaner, Corpus, FitSummary, Pipeline, PipelineConfig};
use tracing_subscriber::EnvFilter;

const POSITIVE: &[&str] = &[
    "A wonderful film with brilliant acting and a moving score.",
    "Brilliant direction, wonderful cast, the score is moving.",
    "Moving and wonderful. The acting is brilliant throughout.",
    "One of the most brilliant films this year, wonderful acting.",
    "The cast is wonderful and the direction brilliant.",
    "Beautiful, moving, brilliant. Wonderful score and cast.",
];

const NEGATIVE: &[&str] = &[
    "A boring plot, terrible dialogue, and wooden acting.",
    "Terrible pacing and a boring, predictable plot.",
    "Wooden performances, terrible script, boring from start.",
    "Predictable and boring. The dialogue is terrible.",
    "The plot is boring and the pacing terrible.",
    "Terrible, wooden, predictable. A boring waste.",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=textclust=debug shows per-stage detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cleaner = BasicCleaner::new()
        .with_stopwords(["the", "and", "is", "of", "this", "from", "one", "most"]);
    let reviews = POSITIVE
        .iter()
        .cycle()
        .take(30)
        .map(|t| (*t, 1u8))
        .chain(NEGATIVE.iter().cycle().take(30).map(|t| (*t, 0u8)));
    let corpus = Corpus::from_labeled_texts(reviews, &cleaner);

    let config = PipelineConfig::default()
        .with_min_term_count(2)
        .with_embedding_rank(8)
        .with_kmeans_k(vec![2, 3])
        .with_gmm_k(vec![2])
        .with_bootstrap(20, 3);
    let report = Pipeline::new(config).run(&corpus)?;

    println!(
        "vocabulary={} cooccurrence_nnz={} missing={}",
        report.vocabulary.len(),
        report.cooccurrence_nnz,
        report.vectors.missing.len()
    );

    for outcome in &report.runs {
        let run = match &outcome.result {
            Ok(run) => run,
            Err(e) => {
                println!("{}: {e}", outcome.method);
                continue;
            }
        };
        println!();
        println!("{} k={}", outcome.method, outcome.k);
        if let FitSummary::Gmm { covariance, bic, .. } = &run.fit {
            println!("  covariance={covariance:?} bic={bic:.1}");
        }
        println!(
            "  davies_bouldin={:.3?} silhouette={:.3?} degenerate={}",
            run.davies_bouldin,
            run.silhouette,
            run.degenerate.len()
        );
        for e in &run.evaluation_errors {
            println!("  {e}");
        }
        if let Some(stability) = &run.stability {
            println!("  stability={:.3?}", stability.scores());
        }
        for (row, terms) in run.crosstab.rows.iter().zip(&run.top_terms) {
            let words: Vec<&str> =
                terms.terms.iter().take(4).map(|(t, _)| t.as_str()).collect();
            println!(
                "  cluster {:>2}: positive={:.2} n={} terms={:?}",
                row.cluster,
                row.proportion(1),
                row.labeled(),
                words
            );
        }
    }

    Ok(())
}
