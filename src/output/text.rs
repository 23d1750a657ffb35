//! Human-readable report of a run.

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::actions::{GroupReport, TargetOutcome};
use crate::duplicates::RunSummary;

/// Plain-text report printed after a run.
#[derive(Debug)]
pub struct TextReport<'a> {
    groups: &'a [GroupReport],
    summary: &'a RunSummary,
    dry_run: bool,
}

impl<'a> TextReport<'a> {
    #[must_use]
    pub fn new(groups: &'a [GroupReport], summary: &'a RunSummary, dry_run: bool) -> Self {
        Self {
            groups,
            summary,
            dry_run,
        }
    }

    /// Write unsuccessful targets, then the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for group in self.groups.iter().filter(|g| !g.success) {
            writeln!(w, "Incomplete group for {}:", group.source.display())?;
            for target in group.targets.iter().filter(|t| !t.outcome.is_success()) {
                match &target.error {
                    Some(error) => writeln!(w, "    {}: {}", target.path.display(), error)?,
                    None => writeln!(w, "    {}", target.path.display())?,
                }
            }
        }

        let s = self.summary;
        let (verb, space) = if self.dry_run {
            ("Would link", "Reclaimable")
        } else {
            ("Linked", "Reclaimed")
        };

        writeln!(w, "Files examined:   {}", s.total)?;
        writeln!(
            w,
            "  catalog:        {} existing ({} updated), {} new, {} errors",
            s.existing, s.updated, s.created, s.errors
        )?;
        if s.scan_errors > 0 {
            writeln!(w, "  scan errors:    {}", s.scan_errors)?;
        }
        writeln!(w, "Duplicate groups: {} ({} skipped)", s.groups, s.skipped)?;
        writeln!(w, "{:<17} {}", format!("{verb}:"), s.linked)?;
        if s.already_linked > 0 {
            writeln!(w, "Already linked:   {}", s.already_linked)?;
        }
        if s.cross_device > 0 {
            writeln!(w, "Other volume:     {}", s.cross_device)?;
        }
        if s.failed > 0 {
            writeln!(w, "Failed:           {}", s.failed)?;
        }
        if s.write_failures > 0 {
            writeln!(w, "Catalog failures: {}", s.write_failures)?;
        }
        writeln!(
            w,
            "{:<17} {}",
            format!("{space}:"),
            ByteSize::b(s.reclaimed_bytes)
        )?;
        writeln!(w, "Elapsed:          {:.2?}", s.duration)?;
        Ok(())
    }

    /// Number of targets with the given outcome across all groups.
    #[must_use]
    pub fn count(&self, outcome: TargetOutcome) -> usize {
        self.groups.iter().map(|g| g.count(outcome)).sum()
    }
}
