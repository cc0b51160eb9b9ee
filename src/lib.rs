//! # chromagap
//!
//! Moves files across an air gap as a sequence of colored panels. Each panel carries one
//! chunk under Reed-Solomon protection and can be photographed or screen captured on the
//! receiving side.
//!
//! ## Pipeline
//!
//! - **Sender**: compresses every input file, describes the batch in a manifest, and splits
//!   manifest and file streams into fixed size chunks with an optional XOR key.
//! - **Panels**: each chunk is rendered as a 108x108 module grid. Four finder squares sit in the
//!   corners, a 4-color metadata ring frames the data and the data modules use an 8-color
//!   palette.
//! - **Reader**: locates the finders in a capture, rectifies it with a homography, classifies
//!   every module and corrects each Reed-Solomon block.
//! - **Receiver**: indexes the recovered chunks, decodes the manifest and streams each file back
//!   through an in-order decompressor while verifying its SHA-256.
//!
//! ## Quick Start
//!
//! ### One panel
//!
//! ```rust
//! use chromagap::{CodecConfig, PanelBuilder, PanelReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CodecConfig::default();
//! let panel = PanelBuilder::new(&cfg).build(b"Hello, air gap!")?;
//!
//! let img = panel.to_image(cfg.scale);
//! let data = PanelReader::new(&cfg).read_rgb(img)?;
//! assert_eq!(data, b"Hello, air gap!");
//! # Ok(())
//! # }
//! ```
//!
//! ### A whole batch
//!
//! ```rust,no_run
//! use chromagap::transfer::{ChunkIndex, DirSink, Receiver, Sender};
//! use chromagap::{panels, CodecConfig, TransferConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = CodecConfig::default();
//!
//! // Sending side
//! let mut sink = DirSink::new("outbox/chunks")?;
//! Sender::new(TransferConfig::default()).with_key("k1").send(&["report.pdf"], &mut sink)?;
//! panels::encode_blobs("outbox/chunks", "outbox/panels", &codec)?;
//!
//! // Receiving side, after the panels were captured into inbox/panels
//! panels::decode_images("inbox/panels", "inbox/chunks", &codec)?;
//! let index = ChunkIndex::scan_dir("inbox/chunks")?;
//! let report = Receiver::new(TransferConfig::default())
//!     .with_key("k1")
//!     .reassemble(&index, "inbox/files")?;
//! println!("{} of {} files verified", report.verified(), report.files.len());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::suspicious_arithmetic_impl, clippy::suspicious_op_assign_impl)]

pub mod builder;
pub mod common;
pub mod panels;
pub mod reader;
pub mod transfer;

pub use builder::{Panel, PanelBuilder};
pub use common::{CodecConfig, GapError, GapResult, TransferConfig};
pub use reader::PanelReader;
