//! bindery: book chunking, indexed chunk storage, reconstruction, and
//! fusion search
//!
//! The pipeline runs leaf-first: an ordered paragraph stream (produced by
//! an external extraction layer) is chunked into three parallel tiers of
//! overlap-linked segments, persisted with stable ordering keys and a
//! full-text index, and later reassembled into derived views or queried
//! across documents with per-document grouping.
//!
//! ```no_run
//! use bindery::{
//!     config::Config,
//!     ingest::Ingestor,
//!     models::{ParagraphRecord, RawDocument},
//!     reconstruct::{Reconstructor, View},
//!     store::ChunkStore,
//! };
//!
//! # async fn example() -> bindery::error::Result<()> {
//! let config = Config::default();
//! let store = ChunkStore::open(std::path::Path::new("bindery.db")).await?;
//!
//! let ingestor = Ingestor::new(&store, &config);
//! ingestor
//!     .ingest_batch(vec![RawDocument {
//!         title: "Alpha".into(),
//!         author: "Author".into(),
//!         paragraphs: vec![ParagraphRecord::new(Some(1), None, "...")],
//!     }])
//!     .await?;
//!
//! let recon = Reconstructor::new(&store, &config);
//! let full = recon.reconstruct_by_name("Alpha", View::Full).await?;
//! println!("{}", full.content);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod fusion;
pub mod ingest;
pub mod models;
pub mod reconstruct;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use fusion::{FusionHit, FusionSearch};
pub use ingest::{IngestReport, Ingestor};
pub use models::{Chunk, ChunkTier, Document, DocumentStatus, ParagraphRecord, RawDocument};
pub use reconstruct::{Reconstruction, Reconstructor, View};
pub use store::{ChunkStore, ScoredChunk};
