//! # Voxel Streamer Entry Point
//!
//! Calls into the library's `run()` and reports startup errors.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json]
//! ```

fn main() {
    if let Err(err) = voxel_streamer::run() {
        log::error!("{err}");
        eprintln!("voxel-streamer: {err}");
        std::process::exit(1);
    }
}
