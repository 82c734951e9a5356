//! # Burritos
//!
//! Backend of the acquisition data browser. An external analysis pipeline
//! drops one JSON parameter file, per-detector signals and rendered plots for
//! every data dump into a date-routed tree; this crate resolves, serves and
//! annotates those files.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ Filename     │──▶│ Path         │──▶│ Comment store        │
//! │ date codec   │   │ resolver     │   │ Configuration store  │
//! └──────────────┘   └──────────────┘   │ Acquisition readers  │
//!                                       └──────────┬───────────┘
//!                        ┌─────────────────────────┤
//!                        ▼                         ▼
//!                  ┌──────────┐              ┌──────────┐
//!                  │   CLI    │              │   HTTP   │
//!                  │(burritos)│              │ (axum)   │
//!                  └──────────┘              └──────────┘
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! MAIN_DIR/YYYY/MM/DD/{JSON,<detector>,Together,Same}/...
//! MAIN_DIR/YYYY/MM/DD/JSON/comments.json
//! ANALYSIS_DIR/configurations/{configuration,default_config_positrons,
//!                              default_config_antiprotons,latest}.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`codec`] | Acquisition filename parsing and validation |
//! | [`models`] | Core data types |
//! | [`paths`] | Date-routed path resolution |
//! | [`json_io`] | Pretty, atomic JSON reads and writes |
//! | [`comments`] | Per-day comment store |
//! | [`configuration`] | Analysis configuration store |
//! | [`acquisition`] | Listings, acquisition JSON, signals, plots |
//! | [`skim`] | Parameter table across a range of dumps |
//! | [`watch`] | Polling with an explicit listing cache |
//! | [`reanalyse`] | External analysis trigger |
//! | [`auth`] | Cookie/JWT sessions |
//! | [`server`] | HTTP gateway |
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Store error taxonomy |

pub mod acquisition;
pub mod auth;
pub mod codec;
pub mod comments;
pub mod config;
pub mod configuration;
pub mod error;
pub mod json_io;
pub mod models;
pub mod paths;
pub mod reanalyse;
pub mod server;
pub mod skim;
pub mod watch;
