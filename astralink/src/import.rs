//! Reads the tool's edge table back into a [`LinkGraph`].
//!
//! The table holds `source_frame,source_label,target_frame,target_label,weight`
//! rows after one header row. Labels are matched to spots through a
//! [`FrameLabelIndex`] built from the exported label image.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::LinkGraph;
use crate::labels::sample_label;
use crate::logger::Logger;
use crate::raster::{Calibration, LabelStack};
use crate::spot::{SpotCollection, SpotId};

pub const EDGE_TABLE_COLUMNS: [&str; 5] = [
    "source_frame",
    "source_label",
    "target_frame",
    "target_label",
    "weight",
];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Edge table '{path}' does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read edge table '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed edge table '{path}' at line {line}: {message}")]
    Malformed {
        path: PathBuf,
        line: u64,
        message: String,
    },
}

/// Why a `(frame, label)` pair did not resolve to a spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMiss {
    NoFrame,
    NoLabel,
}

/// `frame -> label -> spot` lookup.
#[derive(Debug, Clone, Default)]
pub struct FrameLabelIndex {
    frames: HashMap<u32, HashMap<u16, SpotId>>,
}

impl FrameLabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples `labels` under every spot centre in the spot's own frame.
    /// Spots over background are left out.
    pub fn from_label_stack(
        spots: &SpotCollection,
        labels: &LabelStack,
        calibration: &Calibration,
    ) -> Self {
        let mut index = Self::new();
        for spot in spots.iter() {
            match sample_label(labels, spot, calibration) {
                Some(label) => index.insert(spot.frame, label, spot.id),
                None => warn!(
                    spot = %spot.id,
                    frame = spot.frame,
                    "Spot centre is over background; not indexed"
                ),
            }
        }
        index
    }

    /// Trusts a label stored as a spot feature instead of sampling the image.
    #[deprecated(note = "labels stored as features go stale; use `from_label_stack`")]
    pub fn from_label_feature(spots: &SpotCollection, feature: &str) -> Self {
        let mut index = Self::new();
        for spot in spots.iter() {
            let Some(value) = spot.feature(feature) else {
                continue;
            };
            if value >= 1.0 && value <= u16::MAX as f64 && value.fract() == 0.0 {
                index.insert(spot.frame, value as u16, spot.id);
            }
        }
        index
    }

    /// Registers `spot` under `(frame, label)`; a later spot with the same key wins.
    pub fn insert(&mut self, frame: u32, label: u16, spot: SpotId) {
        if let Some(previous) = self.frames.entry(frame).or_default().insert(label, spot) {
            if previous != spot {
                warn!(frame, label, %previous, %spot, "Two spots share one label");
            }
        }
    }

    pub fn resolve(&self, frame: i64, label: i64) -> Result<SpotId, LookupMiss> {
        let labels = u32::try_from(frame)
            .ok()
            .and_then(|frame| self.frames.get(&frame))
            .ok_or(LookupMiss::NoFrame)?;
        u16::try_from(label)
            .ok()
            .and_then(|label| labels.get(&label).copied())
            .ok_or(LookupMiss::NoLabel)
    }

    pub fn len(&self) -> usize {
        self.frames.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRecord {
    pub source_frame: i64,
    pub source_label: i64,
    pub target_frame: i64,
    pub target_label: i64,
    pub weight: f64,
}

impl EdgeRecord {
    fn parse(record: &csv::StringRecord) -> Result<Self, String> {
        if record.len() != EDGE_TABLE_COLUMNS.len() {
            return Err(format!(
                "expected {} fields, found {}",
                EDGE_TABLE_COLUMNS.len(),
                record.len()
            ));
        }
        let int = |idx: usize| -> Result<i64, String> {
            record[idx]
                .parse()
                .map_err(|err| format!("{} '{}': {err}", EDGE_TABLE_COLUMNS[idx], &record[idx]))
        };
        let weight: f64 = record[4]
            .parse()
            .map_err(|err| format!("{} '{}': {err}", EDGE_TABLE_COLUMNS[4], &record[4]))?;

        Ok(Self {
            source_frame: int(0)?,
            source_label: int(1)?,
            target_frame: int(2)?,
            target_label: int(3)?,
            weight,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub rows: usize,
    pub edges_added: usize,
    pub duplicate_edges: usize,
    pub skipped_rows: usize,
}

fn miss_message(miss: LookupMiss, role: &str, frame: i64, label: i64) -> String {
    match miss {
        LookupMiss::NoFrame => format!(" - no spot in frame {frame}. Skipping."),
        LookupMiss::NoLabel => format!(" - no spot matching {role} label {label}. Skipping."),
    }
}

fn csv_error(path: &Path, err: csv::Error) -> ImportError {
    let line = err.position().map_or(0, |pos| pos.line());
    match err.into_kind() {
        csv::ErrorKind::Io(source) => ImportError::Io {
            path: path.to_path_buf(),
            source,
        },
        kind => ImportError::Malformed {
            path: path.to_path_buf(),
            line,
            message: format!("{kind:?}"),
        },
    }
}

/// Adds one edge per resolvable row of the table at `path` to `graph`.
///
/// Rows naming a spot that is not in `index` are reported to `logger` and
/// skipped. Any unparsable row aborts the whole import.
pub fn import_edges(
    path: &Path,
    index: &FrameLabelIndex,
    graph: &mut LinkGraph,
    logger: &dyn Logger,
) -> Result<ImportReport, ImportError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ImportError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ImportError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut report = ImportReport::default();
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(csv_error(path, err)),
        }
        let line = record.position().map_or(0, |pos| pos.line());
        let edge = EdgeRecord::parse(&record).map_err(|message| ImportError::Malformed {
            path: path.to_path_buf(),
            line,
            message,
        })?;
        report.rows += 1;

        let source = match index.resolve(edge.source_frame, edge.source_label) {
            Ok(spot) => spot,
            Err(miss) => {
                logger.warn(&miss_message(miss, "source", edge.source_frame, edge.source_label));
                report.skipped_rows += 1;
                continue;
            }
        };
        let target = match index.resolve(edge.target_frame, edge.target_label) {
            Ok(spot) => spot,
            Err(miss) => {
                logger.warn(&miss_message(miss, "target", edge.target_frame, edge.target_label));
                report.skipped_rows += 1;
                continue;
            }
        };

        graph.add_vertex(source);
        graph.add_vertex(target);
        match graph.add_edge(source, target, edge.weight) {
            Some(_) => report.edges_added += 1,
            None => report.duplicate_edges += 1,
        }
    }

    debug!(path = %path.display(), ?report, "Imported edge table");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use common::output_stream::{OutputLevel, OutputStream};

    use super::*;
    use crate::logger::VoidLogger;
    use crate::spot::Spot;

    const HEADER: &str = "source_frame,source_label,target_frame,target_label,weight\n";

    struct Fixture {
        dir: tempfile::TempDir,
        spots: Vec<SpotId>,
        index: FrameLabelIndex,
    }

    /// Spots `0..4`: frame 0 labels 1 and 2, frame 1 labels 1 and 2.
    fn fixture() -> Fixture {
        let mut index = FrameLabelIndex::new();
        let mut spots = Vec::new();
        for frame in 0..2 {
            for label in 1..=2 {
                let id = SpotId::unique();
                index.insert(frame, label, id);
                spots.push(id);
            }
        }
        Fixture {
            dir: tempfile::tempdir().unwrap(),
            spots,
            index,
        }
    }

    fn table(fixture: &Fixture, rows: &str) -> PathBuf {
        let path = fixture.dir.path().join("edges.csv");
        std::fs::write(&path, format!("{HEADER}{rows}")).unwrap();
        path
    }

    #[test]
    fn rows_become_weighted_edges() {
        let f = fixture();
        let path = table(&f, "0,1,1,1,0.93\n0,2,1,2,0.71\n");
        let mut graph = LinkGraph::new();

        let report = import_edges(&path, &f.index, &mut graph, &VoidLogger).unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.edges_added, 2);
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_weight(f.spots[0], f.spots[2]), Some(0.93));
        assert_eq!(graph.edge_weight(f.spots[1], f.spots[3]), Some(0.71));
    }

    #[test]
    fn unresolved_rows_are_skipped_with_a_warning() {
        let f = fixture();
        let path = table(&f, "0,1,1,1,0.9\n5,1,1,1,0.5\n0,9,1,2,0.5\n0,2,1,7,0.5\n");
        let mut graph = LinkGraph::new();
        let stream = OutputStream::new();

        let report = import_edges(&path, &f.index, &mut graph, &stream).unwrap();

        assert_eq!(report.rows, 4);
        assert_eq!(report.skipped_rows, 3);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(stream.count(OutputLevel::Warn), 3);
        assert!(stream.contains(" - no spot in frame 5. Skipping."));
        assert!(stream.contains(" - no spot matching source label 9. Skipping."));
        assert!(stream.contains(" - no spot matching target label 7. Skipping."));
    }

    #[test]
    fn duplicate_rows_add_one_edge() {
        let f = fixture();
        let path = table(&f, "0,1,1,1,0.9\n0,1,1,1,0.4\n1,1,0,1,0.2\n");
        let mut graph = LinkGraph::new();

        let report = import_edges(&path, &f.index, &mut graph, &VoidLogger).unwrap();

        assert_eq!(report.edges_added, 1);
        assert_eq!(report.duplicate_edges, 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight(f.spots[0], f.spots[2]), Some(0.9));
    }

    #[test]
    fn empty_table_imports_nothing() {
        let f = fixture();
        let mut graph = LinkGraph::new();

        let header_only = table(&f, "");
        let report = import_edges(&header_only, &f.index, &mut graph, &VoidLogger).unwrap();
        assert_eq!(report, ImportReport::default());

        let blank = f.dir.path().join("blank.csv");
        std::fs::write(&blank, "").unwrap();
        import_edges(&blank, &f.index, &mut graph, &VoidLogger).unwrap();
        assert_eq!(graph.vertex_count(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let f = fixture();
        let err = import_edges(
            &f.dir.path().join("absent.csv"),
            &f.index,
            &mut LinkGraph::new(),
            &VoidLogger,
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::NotFound { .. }));
    }

    #[test]
    fn unreadable_table_is_an_io_error() {
        let f = fixture();
        let err = import_edges(f.dir.path(), &f.index, &mut LinkGraph::new(), &VoidLogger)
            .unwrap_err();
        match err {
            ImportError::Io { path, .. } => assert_eq!(path, f.dir.path()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_numbers_and_short_rows_are_malformed() {
        let f = fixture();
        let path = table(&f, "0,1,1,1,0.9\n0,one,1,1,0.9\n");
        let err = import_edges(&path, &f.index, &mut LinkGraph::new(), &VoidLogger).unwrap_err();
        match err {
            ImportError::Malformed { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("source_label 'one'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let path = table(&f, "0,1,1,1\n");
        let err = import_edges(&path, &f.index, &mut LinkGraph::new(), &VoidLogger).unwrap_err();
        assert!(err.to_string().contains("expected 5 fields, found 4"));
    }

    #[test]
    fn index_resolves_by_frame_then_label() {
        let f = fixture();
        assert_eq!(f.index.len(), 4);
        assert_eq!(f.index.resolve(1, 2), Ok(f.spots[3]));
        assert_eq!(f.index.resolve(3, 1), Err(LookupMiss::NoFrame));
        assert_eq!(f.index.resolve(-1, 1), Err(LookupMiss::NoFrame));
        assert_eq!(f.index.resolve(0, 70_000), Err(LookupMiss::NoLabel));
    }

    #[test]
    fn index_from_label_stack_skips_background_spots() {
        use crate::raster::Dimensions;

        let mut labels = LabelStack::new(Dimensions::new(8, 8, 1, 1), 1);
        labels.set(2, 2, 0, 0, 0, 4);
        let on = Spot::new(0, 2.0, 2.0, 0.0, 1.0);
        let off = Spot::new(0, 6.0, 6.0, 0.0, 1.0);
        let spots: SpotCollection = [on.clone(), off].into_iter().collect();

        let index = FrameLabelIndex::from_label_stack(&spots, &labels, &Calibration::default());

        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(0, 4), Ok(on.id));
    }

    #[test]
    #[allow(deprecated)]
    fn index_from_feature_uses_stored_labels() {
        let spot = Spot::new(1, 0.0, 0.0, 0.0, 1.0).with_feature("LABEL", 3.0);
        let unlabelled = Spot::new(1, 5.0, 0.0, 0.0, 1.0);
        let spots: SpotCollection = [spot.clone(), unlabelled].into_iter().collect();

        let index = FrameLabelIndex::from_label_feature(&spots, "LABEL");

        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(1, 3), Ok(spot.id));
    }
}
