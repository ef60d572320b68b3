//! Ingestion: folding freshly parsed channels into what is already stored.

pub mod reconcile;

pub use reconcile::reconcile_channels;
