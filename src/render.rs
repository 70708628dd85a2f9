//! Report renderers.
//!
//! Renderers receive finished, immutable [`DateReport`]s and write them to a
//! sink. Nothing here touches the snapshot or the aggregates.

use std::io::Write;

use crate::report::{DateReport, ProjectReport};

/// Writes date reports somewhere.
pub trait ReportRenderer {
    fn render(&mut self, report: &DateReport) -> std::io::Result<()>;
}

/// Human-readable progress lines.
#[derive(Debug)]
pub struct TextRenderer<W: Write> {
    out: W,
    /// Include the histogram and run breakdown after the summary lines.
    pub detail: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, detail: true }
    }

    pub fn summary_only(out: W) -> Self {
        Self { out, detail: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn project(&mut self, p: &ProjectReport) -> std::io::Result<()> {
        let out = &mut self.out;
        writeln!(out, "{}", p.descriptor.describe())?;
        writeln!(
            out,
            "Finished {} clones which is {:3.1} % of clones.",
            p.finished_clones.count, p.finished_clones.percent
        )?;
        writeln!(
            out,
            "Finished {} WU which is {:3.1} % of clones.",
            p.finished_units.count, p.finished_units.percent
        )?;
        writeln!(
            out,
            "Failed {} clones which is {:3.1} % of clones.",
            p.failed_clones.count, p.failed_clones.percent
        )?;
        writeln!(
            out,
            "Assigned {} clones which is {:3.1} % of clones.",
            p.assigned_clones.count, p.assigned_clones.percent
        )?;
        writeln!(
            out,
            "Simulated {:.3} us over {} work units",
            p.total_trajectory_length / 1000.0,
            p.work_units
        )?;
        if p.skipped > 0 {
            writeln!(out, "Skipped {} undecodable work units.", p.skipped)?;
        }
        if !self.detail {
            return Ok(());
        }

        if !p.histogram.is_empty() {
            write!(out, "  Traj length (ns)          clones")?;
            for run in &p.runs {
                write!(out, "  {:>6}", format!("run {}", run.run))?;
            }
            writeln!(out)?;
            let last = p.histogram.len() - 1;
            for (i, bin) in p.histogram.iter().enumerate() {
                let close = if i == last { ']' } else { ')' };
                write!(
                    out,
                    "  [{:>9.1}, {:>9.1}{close}  {:>6}",
                    bin.lower, bin.upper, bin.count
                )?;
                for run in &p.runs {
                    let count = run.histogram.get(i).map_or(0, |b| b.count);
                    write!(out, "  {count:>6}")?;
                }
                writeln!(out)?;
            }
        }
        if !p.runs.is_empty() {
            writeln!(out, "  run  clones  finished  failed  assigned  traj (us)")?;
            for run in &p.runs {
                writeln!(
                    out,
                    "  {:>3}  {:>6}  {:>8}  {:>6}  {:>8}  {:>9.3}",
                    run.run,
                    run.clones,
                    run.finished,
                    run.failed,
                    run.assigned,
                    run.trajectory_length / 1000.0
                )?;
            }
        }
        Ok(())
    }
}

impl<W: Write> ReportRenderer for TextRenderer<W> {
    fn render(&mut self, report: &DateReport) -> std::io::Result<()> {
        writeln!(self.out, "== {} ({}) ==", report.date, report.snapshot)?;
        for project in &report.projects {
            self.project(project)?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

/// One pretty-printed JSON document per date.
#[derive(Debug)]
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportRenderer for JsonRenderer<W> {
    fn render(&mut self, report: &DateReport) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
