use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{emphasis, failure, pending, success};

/// Progress tracking for the three pull phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_resolving() -> Self {
        eprintln!("{}  {}", emphasis("⚙️"), emphasis("Phases").underlined());
        let pb = create_spinner(pending("Phase 1/3: Resolving builds").to_string());
        Self { pb }
    }

    pub fn finish_resolving_start_listing(self, builds: usize) -> Self {
        self.pb.finish_with_message(
            success(format!("Phase 1/3: Resolved {builds} build(s) ✓")).to_string(),
        );
        let pb = create_spinner(pending("Phase 2/3: Listing artifacts").to_string());
        Self { pb }
    }

    pub fn finish_listing_start_downloading(self, artifacts: usize) -> Self {
        self.pb.finish_with_message(
            success(format!("Phase 2/3: Found {artifacts} intermediate file(s) ✓"))
                .to_string(),
        );
        let pb = create_spinner(pending("Phase 3/3: Downloading artifacts").to_string());
        Self { pb }
    }

    pub fn finish_downloading(self, failed: usize) {
        if failed == 0 {
            self.pb
                .finish_with_message(success("Phase 3/3: Artifacts downloaded ✓").to_string());
        } else {
            self.pb.finish_with_message(
                failure(format!("Phase 3/3: {failed} download(s) failed ✗")).to_string(),
            );
        }
        eprintln!();
    }

    /// Marks the current phase as failed.
    pub fn abandon(self) {
        self.pb
            .abandon_with_message(failure("Pull aborted ✗").to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
