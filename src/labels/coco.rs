/// COCO annotation files as a label source
use super::{group_rows, ClassMap, LabelSource, Sample};
use crate::boxes::GroundTruthBox;
use crate::error::{BatchError, BatchResult};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Some exporters write numeric ids as strings
fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNum {
        String(String),
        Num(u64),
    }

    match StringOrNum::deserialize(deserializer)? {
        StringOrNum::Num(n) => Ok(n),
        StringOrNum::String(s) => {
            if s.is_empty() {
                Err(de::Error::custom("empty string for required id field"))
            } else {
                s.parse::<u64>().map_err(de::Error::custom)
            }
        }
    }
}

/// COCO annotation file structure; only the fields boxes are built from
#[derive(Debug, Deserialize, Serialize)]
pub struct CocoAnnotations {
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CocoImage {
    #[serde(deserialize_with = "deserialize_u64")]
    pub id: u64,
    pub file_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CocoAnnotation {
    #[serde(deserialize_with = "deserialize_u64")]
    pub image_id: u64,
    #[serde(deserialize_with = "deserialize_u64")]
    pub category_id: u64,
    /// `[x, y, width, height]`
    pub bbox: Vec<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CocoCategory {
    #[serde(deserialize_with = "deserialize_u64")]
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct CocoLabelSource {
    path: PathBuf,
    keep_empty: bool,
}

impl CocoLabelSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        CocoLabelSource {
            path: path.as_ref().to_path_buf(),
            keep_empty: false,
        }
    }

    /// Also yield images that end up with no box of an included class
    #[must_use]
    pub fn keep_empty(mut self, keep: bool) -> Self {
        self.keep_empty = keep;
        self
    }

    fn read(&self) -> BatchResult<CocoAnnotations> {
        let file = File::open(&self.path).map_err(|source| BatchError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| BatchError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Convert already-parsed annotations, e.g. ones built in memory
    pub fn samples_from(
        &self,
        coco: &CocoAnnotations,
        classes: &ClassMap,
    ) -> BatchResult<Vec<Sample>> {
        let image_names: HashMap<u64, &str> = coco
            .images
            .iter()
            .map(|img| (img.id, img.file_name.as_str()))
            .collect();

        let pb = ProgressBar::new(coco.annotations.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}",
            )
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut rows = Vec::new();
        let mut orphans = 0usize;
        for (index, ann) in coco.annotations.iter().enumerate() {
            pb.inc(1);
            let Ok(raw_class) = i64::try_from(ann.category_id) else {
                continue;
            };
            let Some(class_id) = classes.dense(raw_class) else {
                continue;
            };
            let Some(&filename) = image_names.get(&ann.image_id) else {
                orphans += 1;
                pb.set_message(format!("No image with id {}", ann.image_id));
                continue;
            };
            rows.push((filename.to_string(), self.to_box(index, ann, class_id)?));
        }
        pb.finish_with_message("Done scanning annotations");

        if orphans > 0 {
            warn!(
                "{}: skipped {} annotations referring to unknown image ids",
                self.path.display(),
                orphans
            );
        }

        let boxes = rows.len();
        let mut samples = group_rows(rows);
        if self.keep_empty {
            let mut seen: Vec<&str> = samples.iter().map(|s| s.filename.as_str()).collect();
            seen.sort_unstable();
            let mut empty: Vec<Sample> = coco
                .images
                .iter()
                .filter(|img| seen.binary_search(&img.file_name.as_str()).is_err())
                .map(|img| Sample {
                    filename: img.file_name.clone(),
                    boxes: Vec::new(),
                })
                .collect();
            samples.append(&mut empty);
            samples.sort_by(|a, b| a.filename.cmp(&b.filename));
        }

        info!(
            "Loaded {} boxes for {} images from {}",
            boxes,
            samples.len(),
            self.path.display()
        );
        Ok(samples)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_box(
        &self,
        index: usize,
        ann: &CocoAnnotation,
        class_id: usize,
    ) -> BatchResult<GroundTruthBox> {
        let [x, y, w, h] = ann.bbox[..] else {
            return Err(BatchError::Annotation {
                path: self.path.clone(),
                index: index + 1,
                msg: format!(
                    "bbox must be [x, y, width, height], got {} values",
                    ann.bbox.len()
                ),
            });
        };
        if !(x.is_finite() && y.is_finite() && w >= 0.0 && h >= 0.0) {
            return Err(BatchError::Annotation {
                path: self.path.clone(),
                index: index + 1,
                msg: format!("bbox {:?} is not a valid box", ann.bbox),
            });
        }
        Ok(GroundTruthBox::new(
            class_id,
            x as i32,
            (x + w) as i32,
            y as i32,
            (y + h) as i32,
        ))
    }
}

impl LabelSource for CocoLabelSource {
    fn load(&self, classes: &ClassMap) -> BatchResult<Vec<Sample>> {
        let coco = self.read()?;
        self.samples_from(&coco, classes)
    }
}
