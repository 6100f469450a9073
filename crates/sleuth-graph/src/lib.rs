//! Sleuth Graph
//!
//! Traversal, focus and relation inference over a case's graph snapshot.

pub mod board;
pub mod focus;
pub mod inference;
pub mod traversal;

pub use board::{CandidateBoard, INFERENCE_CONTEXT, INFERENCE_RELATION_TYPE};
pub use focus::{focus_partition, FocusPartition, FocusState, FocusView};
pub use inference::{generate_candidates, CandidateKind, CandidateRelation, MAX_CANDIDATES};
pub use traversal::{expansion_cone, find_all_paths, path_edges, Cone, ConeDirection};
