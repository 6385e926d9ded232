//! Build script for portgate
//!
//! Embeds build-time information (git commit, dirty status, build timestamp)
//! for the CLI's long version string.

fn main() {
    shadow_rs::ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build info");
}
