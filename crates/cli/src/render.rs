use std::fmt;

use sift_core::{AnalysisReport, Dataset, KaggleDataset, UsageReport};

const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

pub struct DatasetTable<'a>(pub &'a [Dataset]);

impl fmt::Display for DatasetTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no datasets uploaded");
        }
        writeln!(f, "{:<28} {:<24} {:<6} {:>10}", "ID", "NAME", "TYPE", "SIZE")?;
        for (i, dataset) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<28} {:<24} {:<6} {:>10}",
                dataset.id.as_str(),
                dataset.name,
                dataset.format.as_str(),
                human_size(dataset.size)
            )?;
        }
        Ok(())
    }
}

pub struct DatasetDetail<'a>(pub &'a Dataset);

impl fmt::Display for DatasetDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dataset = self.0;
        writeln!(f, "{} ({})", dataset.name, dataset.id)?;
        if !dataset.description.is_empty() {
            writeln!(f, "{}", dataset.description)?;
        }
        writeln!(
            f,
            "type: {}  size: {}  updated: {}",
            dataset.format,
            human_size(dataset.size),
            dataset.last_updated
        )?;
        write!(f, "columns: {}", dataset.columns.join(", "))
    }
}

pub struct KaggleTable<'a>(pub &'a [KaggleDataset]);

impl fmt::Display for KaggleTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no matching Kaggle datasets");
        }
        for (i, dataset) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<40} {:>10} {:>8} downloads  {}",
                dataset.id,
                human_size(dataset.size),
                dataset.download_count,
                dataset.title
            )?;
        }
        Ok(())
    }
}

pub struct ReportView<'a>(pub &'a AnalysisReport);

impl fmt::Display for ReportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let narrative = &report.narrative;

        writeln!(f, "{}", narrative.executive_summary)?;
        section(f, "Key findings", &narrative.key_findings)?;
        section(f, "Business implications", &narrative.business_implications)?;
        section(f, "Recommendations", &narrative.recommendations)?;
        section(f, "Next steps", &narrative.next_steps)?;

        if !report.visualizations.plots.is_empty() {
            writeln!(f, "\nVisualizations")?;
            for plot in &report.visualizations.plots {
                let subject = plot
                    .column
                    .as_deref()
                    .or(plot.name.as_deref())
                    .unwrap_or("dataset");
                writeln!(f, "  - {} of {}", plot.kind, subject)?;
            }
        }

        let qa = &report.qa_review;
        if !qa.quality_checks.is_empty() {
            writeln!(
                f,
                "\nQA ({}): clarity {:.2}, accuracy {:.2}, actionability {:.2}",
                qa.validation_status, qa.clarity_score, qa.accuracy_score, qa.actionability_score
            )?;
            for check in qa.failed_checks() {
                writeln!(f, "  failed: {} ({})", check.aspect, check.comments)?;
            }
        }

        section(f, "Warnings", &report.warnings)
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "\n{title}")?;
    for item in items {
        writeln!(f, "  - {item}")?;
    }
    Ok(())
}

pub struct UsageView<'a>(pub &'a UsageReport);

impl fmt::Display for UsageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let snapshot = &report.snapshot;
        write!(
            f,
            "tokens used: {} / {} ({:.1}%), {} remaining",
            snapshot.current_usage,
            snapshot.daily_limit,
            report.usage_percentage,
            snapshot.remaining_tokens
        )?;
        for (agent, used) in &snapshot.usage_by_agent {
            write!(f, "\n  {agent}: {used}")?;
        }
        if report.warning {
            write!(f, "\nwarning: daily token budget nearly exhausted")?;
        }
        Ok(())
    }
}

fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sift_core::{DatasetFormat, DatasetId, TokenUsageSnapshot};
    use std::collections::BTreeMap;

    fn usage_report(current: u64) -> UsageReport {
        let last_reset = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .expect("valid timestamp");
        let snapshot = TokenUsageSnapshot::new(current, 10_000, BTreeMap::new(), last_reset);
        UsageReport::from_snapshot(snapshot, 90.0)
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn usage_warns_when_over_threshold() {
        let text = UsageView(&usage_report(9200)).to_string();
        assert!(text.starts_with("tokens used: 9200 / 10000 (92.0%), 800 remaining"));
        assert!(text.contains("warning"));

        let text = UsageView(&usage_report(5000)).to_string();
        assert!(!text.contains("warning"));
    }

    #[test]
    fn dataset_table() {
        assert_eq!(DatasetTable(&[]).to_string(), "no datasets uploaded");

        let datasets = [Dataset {
            id: DatasetId::new("dataset_1"),
            name: "sales".to_string(),
            description: String::new(),
            format: DatasetFormat::Csv,
            size: 2048,
            columns: vec!["region".to_string()],
            last_updated: "2024-05-01T00:00:00".to_string(),
        }];
        let text = DatasetTable(&datasets).to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).is_some_and(|line| line.starts_with("dataset_1")));
        assert!(text.contains("2.0 KiB"));
    }
}
