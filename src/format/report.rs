//! Plain-text annotation report.

use std::fmt;

use crate::format::projection::{ExportProjection, percentage};

/// Number of leading catalog classes the report scores against each other.
pub const SCORED_CLASSES: usize = 2;

/// Count and share of one scored class.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub name: String,
    pub count: usize,
    pub percentage: f64,
}

/// Summary of one image: the first two catalog classes (positive and
/// negative in the default catalog) with their share of the scored total.
///
/// Classes beyond the first two do not count toward the total.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationReport {
    pub image_name: String,
    pub lines: Vec<ReportLine>,
    pub total: usize,
}

impl AnnotationReport {
    /// Build the report for `image_name` from a projection.
    pub fn new(image_name: &str, projection: &ExportProjection) -> Self {
        let scored: Vec<_> = projection.stats().iter().take(SCORED_CLASSES).collect();
        let total = scored.iter().map(|c| c.count).sum();
        let lines = scored
            .into_iter()
            .map(|c| ReportLine {
                name: c.name.clone(),
                count: c.count,
                percentage: percentage(c.count, total),
            })
            .collect();

        Self {
            image_name: image_name.to_string(),
            lines,
            total,
        }
    }

    /// Render the report as text.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AnnotationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Annotation report")?;
        writeln!(f, "=================")?;
        writeln!(f, "Image name: {}", self.image_name)?;
        for line in &self.lines {
            writeln!(
                f,
                "{} points: {} - Percentage: {:.2}%",
                line.name, line.count, line.percentage
            )?;
        }
        writeln!(f, "Total points: {}", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LabelCatalog, Point};
    use crate::store::PointStore;

    #[test]
    fn test_report_ignores_third_class() {
        let mut store = PointStore::new(LabelCatalog::default());
        store.upsert(Point::new(1, 1), 0).unwrap();
        store.upsert(Point::new(2, 2), 0).unwrap();
        store.upsert(Point::new(3, 3), 0).unwrap();
        store.upsert(Point::new(4, 4), 1).unwrap();
        store.upsert(Point::new(5, 5), 2).unwrap();

        let projection = ExportProjection::from_store(&store).unwrap();
        let report = AnnotationReport::new("slide_01", &projection);

        assert_eq!(report.total, 4);
        assert_eq!(report.lines.len(), 2);
        assert!((report.lines[0].percentage - 75.0).abs() < 1e-9);

        let text = report.to_text();
        assert!(text.contains("Image name: slide_01"));
        assert!(text.contains("Positivo points: 3 - Percentage: 75.00%"));
        assert!(text.contains("Negativo points: 1 - Percentage: 25.00%"));
        assert!(text.contains("Total points: 4"));
    }

    #[test]
    fn test_empty_report_has_zero_percentages() {
        let store = PointStore::new(LabelCatalog::default());
        let projection = ExportProjection::from_store(&store).unwrap();
        let text = AnnotationReport::new("empty", &projection).to_text();
        assert!(text.contains("Positivo points: 0 - Percentage: 0.00%"));
        assert!(text.contains("Total points: 0"));
    }
}
