//! Human-readable build summaries

use console::style;
use kiln_builder::BuildOutcome;

fn line(mark: console::StyledObject<&str>, msg: &str) {
    println!("{} {}", mark, msg);
}

fn field(key: &str, value: &str) {
    println!("  {:<10} {}", style(key).dim(), value);
}

/// Print what a finished build produced
pub fn build_summary(destinations: &[&str], outcome: &BuildOutcome) {
    println!("{}", style("Build complete").bold());
    field("backend", outcome.backend.name());
    field("images", &destinations.join(", "));

    if let Some(archive) = &outcome.archive {
        line(style("✓").green(), &format!("archive written to {}", archive.display()));
    } else if outcome.pushed {
        line(style("✓").green(), "pushed");
        for (destination, digest) in &outcome.digests {
            field("digest", &format!("{} {}", destination, digest));
        }
        if outcome.digests.is_empty() {
            line(style("!").yellow(), "backend reported no digest");
        }
    } else {
        line(style("·").blue(), "not pushed; image kept in local storage");
    }

    for reference in &outcome.signed {
        line(style("✓").green(), &format!("signed {}", reference));
    }
}
