use textclust::embedding::{vectorize, vectorize_corpus, VectorSource};
use textclust::{BasicCleaner, Corpus, Error, Method, Pipeline, PipelineConfig};

fn corpus_with_orphan() -> Corpus {
    let mut texts: Vec<String> = Vec::new();
    for i in 0..30 {
        if i % 2 == 0 {
            texts.push("sharp witty dialogue and a sharp witty cast".into());
        } else {
            texts.push("dull plot dull pacing and a dull ending".into());
        }
    }
    // Every term here occurs once, so none survives pruning.
    texts.push("zyzzyva quokka".into());
    Corpus::from_texts(texts, &BasicCleaner::new().with_stopwords(["and"]))
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_min_term_count(2)
        .with_embedding_rank(4)
        .with_kmeans_k(vec![2])
        .with_gmm_k(Vec::new())
        .with_bootstrap(3, 0)
        .with_seed(3)
}

#[test]
fn out_of_vocabulary_document_is_excluded_not_zeroed() {
    let corpus = corpus_with_orphan();
    let orphan = corpus.len() - 1;
    let report = Pipeline::new(config()).run(&corpus).unwrap();

    assert_eq!(report.vectors.missing, vec![orphan]);
    assert!(!report.vectors.ids.contains(&orphan));

    let doc = corpus.get(orphan).unwrap();
    assert!(vectorize(&doc.tokens, &report.embedding.embeddings).is_missing());

    let run = report.run(Method::Kmeans, 2).unwrap();
    assert_eq!(
        run.assignment.len(),
        corpus.len() - report.vectors.missing.len()
    );
    assert_eq!(run.assignment.label_of(orphan), None);

    let errors = report.vectors.missing_errors();
    assert_eq!(errors, vec![Error::MissingDocumentVector { doc_id: orphan }]);
}

#[test]
fn raw_source_also_flags_the_orphan() {
    let corpus = corpus_with_orphan();
    let report = Pipeline::new(config()).run(&corpus).unwrap();
    let raw = vectorize_corpus(&corpus, &report.embedding.embeddings, VectorSource::Raw);
    assert_eq!(raw.missing, vec![corpus.len() - 1]);
    assert_eq!(raw.len(), corpus.len() - 1);
}
