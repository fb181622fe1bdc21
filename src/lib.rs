//! A remote tiled virtual image with on-demand cell caching.
//!
//! `remote_cells` exposes a very large `(x, y, z, channel, timepoint)` image held by a remote server as a randomly addressable array.
//! Pixel data is only retrievable from the server through expensive blocking calls, each returning one tile or one plane.
//! Each plane is partitioned into fixed-size cells, and each cell is fetched at most once and then served from memory,
//! even when many threads read overlapping regions concurrently.
//!
//! ## Getting Started
//! - Implement [`remote::RemoteStore`] for your image server, or start with the in-memory [`remote::MemoryRemoteStore`].
//! - Open an image with [`image::open_image`] and [`image::ImageOpenOptions`].
//! - Read regions with [`image::CachedVolume::read_region`], or adapt channels to a viewer with [`source::RemoteSource`].
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use remote_cells::{
//!     element::PixelType,
//!     image::{ImageIndex, ImageOpenOptions},
//!     region::Region,
//!     remote::{ImageId, MemoryImage, MemoryRemoteStore, PixelsMetadata},
//! };
//!
//! let store = MemoryRemoteStore::new();
//! let metadata = PixelsMetadata {
//!     size_x: 1000,
//!     size_y: 600,
//!     size_z: 1,
//!     size_c: 1,
//!     size_t: 1,
//!     pixel_type: PixelType::UInt16,
//!     physical_size_x: None,
//!     physical_size_y: None,
//!     physical_size_z: None,
//! };
//! store.add_image(
//!     ImageId(1),
//!     MemoryImage::new(metadata, vec![], |_, _, x, y| ((x * 31 + y) % 65536) as f64),
//! );
//!
//! let index = ImageIndex::<u16>::open(Arc::new(store), &ImageOpenOptions::new(ImageId(1)))?;
//! let volume = index.get_volume(0, 0, 0)?;
//! let elements = volume.read_region(&Region::new_with_ranges(&[500..520, 0..2, 0..1]))?;
//! assert_eq!(elements[0], 500 * 31);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Logging
//! `remote_cells` logs through the [`log`] facade and never installs a logger.
//! Remote calls and cell loads are logged at `debug`, cache hits at `trace`, and reads degraded to zeros at `warn`.
//! Wrap a store in [`remote::UsageLogRemoteStore`] to log every remote call.
//!
//! ## Configuration
//! Global options, such as the number of cells loaded concurrently, are set through [`config::global_config_mut`].
//! Per image options are the immutable [`image::ImageOpenOptions`].
#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;
pub mod element;
pub mod image;
pub mod region;
pub mod remote;
pub mod source;
