use super::{group_rows, ClassMap, LabelSource, Sample};
use crate::boxes::GroundTruthBox;
use crate::error::{BatchError, BatchResult};
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const FIELDS: [&str; 6] = ["image_name", "class_id", "xmin", "xmax", "ymin", "ymax"];

/// Column index of each of the six required fields
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputFormat {
    pub image_name: usize,
    pub class_id: usize,
    pub xmin: usize,
    pub xmax: usize,
    pub ymin: usize,
    pub ymax: usize,
}

impl Default for InputFormat {
    /// `image_name, xmin, xmax, ymin, ymax, class_id`
    fn default() -> Self {
        InputFormat {
            image_name: 0,
            xmin: 1,
            xmax: 2,
            ymin: 3,
            ymax: 4,
            class_id: 5,
        }
    }
}

impl InputFormat {
    /// Build from the column names in file order, e.g. `["image_name", "xmin", ...]`.
    ///
    /// Every field must appear exactly once; extra names are not allowed.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> BatchResult<Self> {
        let position = |field: &str| -> BatchResult<usize> {
            let mut hits = names
                .iter()
                .enumerate()
                .filter(|(_, n)| n.as_ref() == field)
                .map(|(i, _)| i);
            match (hits.next(), hits.next()) {
                (Some(i), None) => Ok(i),
                (None, _) => Err(BatchError::config(format!(
                    "input format is missing `{field}`"
                ))),
                (Some(_), Some(_)) => Err(BatchError::config(format!(
                    "input format lists `{field}` more than once"
                ))),
            }
        };

        if let Some(unknown) = names.iter().find(|n| !FIELDS.contains(&n.as_ref())) {
            return Err(BatchError::config(format!(
                "unknown input format field `{}` (expected {})",
                unknown.as_ref(),
                FIELDS.join(", ")
            )));
        }

        Ok(InputFormat {
            image_name: position("image_name")?,
            class_id: position("class_id")?,
            xmin: position("xmin")?,
            xmax: position("xmax")?,
            ymin: position("ymin")?,
            ymax: position("ymax")?,
        })
    }
}

/// One box per line, comma separated, with a header row.
#[derive(Clone, Debug)]
pub struct CsvLabelSource {
    path: PathBuf,
    format: InputFormat,
}

impl CsvLabelSource {
    pub fn new(path: impl AsRef<Path>, format: InputFormat) -> Self {
        CsvLabelSource {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_line(
        &self,
        line: &str,
        line_no: usize,
        classes: &ClassMap,
    ) -> BatchResult<Option<(String, GroundTruthBox)>> {
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        let parse_err = |msg: String| BatchError::LabelParse {
            path: self.path.clone(),
            line: line_no,
            msg,
        };
        let column = |index: usize, name: &str| -> BatchResult<&str> {
            cols.get(index).copied().ok_or_else(|| {
                parse_err(format!(
                    "missing column {index} (`{name}`), line has {} columns",
                    cols.len()
                ))
            })
        };
        let int = |index: usize, name: &str| -> BatchResult<i64> {
            let raw = column(index, name)?;
            raw.parse::<i64>()
                .map_err(|e| parse_err(format!("`{name}` value {raw:?} is not an integer: {e}")))
        };
        let coord = |index: usize, name: &str| -> BatchResult<i32> {
            let v = int(index, name)?;
            i32::try_from(v).map_err(|_| parse_err(format!("`{name}` value {v} is out of range")))
        };

        let f = &self.format;
        let Some(class_id) = classes.dense(int(f.class_id, "class_id")?) else {
            return Ok(None);
        };
        let filename = column(f.image_name, "image_name")?.to_string();
        let gt_box = GroundTruthBox::new(
            class_id,
            coord(f.xmin, "xmin")?,
            coord(f.xmax, "xmax")?,
            coord(f.ymin, "ymin")?,
            coord(f.ymax, "ymax")?,
        );
        Ok(Some((filename, gt_box)))
    }
}

impl LabelSource for CsvLabelSource {
    fn load(&self, classes: &ClassMap) -> BatchResult<Vec<Sample>> {
        let io_err = |source| BatchError::Io {
            path: self.path.clone(),
            source,
        };
        let reader = BufReader::new(File::open(&self.path).map_err(io_err)?);

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        // Line numbers are 1-based; the header is line 1
        for (index, line) in reader.lines().enumerate().skip(1) {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(&line, index + 1, classes)? {
                Some(row) => rows.push(row),
                None => skipped += 1,
            }
        }

        let boxes = rows.len();
        let samples = group_rows(rows);
        info!(
            "Loaded {} boxes for {} images from {} ({} boxes of excluded classes skipped)",
            boxes,
            samples.len(),
            self.path.display(),
            skipped
        );
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_input_format_from_names() {
        let f = InputFormat::from_names(&["image_name", "xmin", "xmax", "ymin", "ymax", "class_id"])
            .unwrap();
        assert_eq!(f, InputFormat::default());

        assert!(InputFormat::from_names(&["image_name", "xmin", "xmax", "ymin", "ymax"]).is_err());
        assert!(InputFormat::from_names(&[
            "image_name", "xmin", "xmax", "ymin", "ymax", "class_id", "xmin"
        ])
        .is_err());
        assert!(InputFormat::from_names(&[
            "image_name", "xmin", "xmax", "ymin", "ymax", "label"
        ])
        .is_err());
    }

    #[test]
    fn test_load_filters_remaps_and_groups() {
        let file = write_csv(
            "frame,xmin,xmax,ymin,ymax,class_id\n\
             b.jpg, 10, 20, 30, 40, 2\n\
             a.jpg, 1, 2, 3, 4, 5\n\
             a.jpg, 5, 6, 7, 8, 1\n\
             c.jpg, 0, 1, 0, 1, 9\n",
        );
        let classes = ClassMap::new(&[1, 2, 5]).unwrap();
        let samples = CsvLabelSource::new(file.path(), InputFormat::default())
            .load(&classes)
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].filename, "a.jpg");
        assert_eq!(
            samples[0].boxes,
            vec![GroundTruthBox::new(0, 5, 6, 7, 8), GroundTruthBox::new(2, 1, 2, 3, 4)]
        );
        assert_eq!(samples[1].boxes, vec![GroundTruthBox::new(1, 10, 20, 30, 40)]);
    }

    #[test]
    fn test_custom_column_order() {
        let file = write_csv("name,cls,x0,x1,y0,y1\nimg.png,3,1,9,2,8\n");
        let format =
            InputFormat::from_names(&["image_name", "class_id", "xmin", "xmax", "ymin", "ymax"])
                .unwrap();
        let samples = CsvLabelSource::new(file.path(), format)
            .load(&ClassMap::new(&[3]).unwrap())
            .unwrap();
        assert_eq!(samples[0].boxes, vec![GroundTruthBox::new(0, 1, 9, 2, 8)]);
    }

    #[test]
    fn test_bad_integer_reports_line() {
        let file = write_csv("h\na.jpg,1,2,3,4,1\na.jpg,1,x,3,4,1\n");
        let err = CsvLabelSource::new(file.path(), InputFormat::default())
            .load(&ClassMap::new(&[1]).unwrap())
            .unwrap_err();
        assert!(matches!(err, BatchError::LabelParse { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let file = write_csv("h\na.jpg,1,2,3\n");
        let err = CsvLabelSource::new(file.path(), InputFormat::default())
            .load(&ClassMap::new(&[1]).unwrap())
            .unwrap_err();
        assert!(matches!(err, BatchError::LabelParse { line: 2, .. }), "{err}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvLabelSource::new("/nonexistent/labels.csv", InputFormat::default())
            .load(&ClassMap::new(&[1]).unwrap())
            .unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }
}
