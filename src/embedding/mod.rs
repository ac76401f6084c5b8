//! Word embeddings and document vectors.
//!
//! [`Glove`] factorizes a co-occurrence matrix into a dense [`EmbeddingTable`];
//! [`vectorize`] averages table rows into one vector per document.
//!
//! A document with no token in the table has no vector. That case is returned
//! as [`DocumentVector::Missing`] rather than a zero vector: a zero vector would
//! sit at the origin of the embedding space and drag every centroid it joins.

mod glove;
mod vectorize;

pub use glove::{glove_weight, train_embeddings, EmbeddingTable, Glove, GloveFit};
pub use vectorize::{
    vectorize, vectorize_corpus, vectorize_raw, DocumentVector, DocumentVectors, VectorSource,
};
