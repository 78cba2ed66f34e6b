//! Python bindings, built with the `python` feature.
#![allow(clippy::useless_conversion)]

use crate::boxes::GroundTruthBox;
use crate::config::TransformConfig;
use crate::error::{BatchError, BatchResult};
use crate::generator::{BatchGenerator, BatchLabels, BatchMode, LabelEncoder};
use crate::labels::{ClassMap, CocoLabelSource, CsvLabelSource, InputFormat, LabelSource};
use crate::loader::FileImageLoader;
use ndarray::Array2;
use numpy::IntoPyArray;
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyList;

/// Python module for detection batch generation (_core submodule)
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBatchGenerator>()?;
    Ok(())
}

fn to_py_err(err: BatchError) -> PyErr {
    match err {
        BatchError::Io { .. } | BatchError::Image { .. } => PyIOError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// `k x 5` int32 rows of `class_id, xmin, xmax, ymin, ymax`
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn boxes_to_array(boxes: &[GroundTruthBox]) -> Array2<i32> {
    Array2::from_shape_fn((boxes.len(), 5), |(i, j)| {
        let b = &boxes[i];
        match j {
            0 => b.class_id as i32,
            1 => b.xmin,
            2 => b.xmax,
            3 => b.ymin,
            _ => b.ymax,
        }
    })
}

fn boxes_to_list<'py>(py: Python<'py>, boxes: &[Vec<GroundTruthBox>]) -> Bound<'py, PyList> {
    PyList::new_bound(
        py,
        boxes
            .iter()
            .map(|b| boxes_to_array(b).into_pyarray_bound(py)),
    )
}

/// Calls a Python callable with the per-image box arrays of a batch
struct PyLabelEncoder {
    callable: PyObject,
}

impl LabelEncoder for PyLabelEncoder {
    type Target = PyObject;

    fn encode(&self, boxes: &[Vec<GroundTruthBox>]) -> BatchResult<PyObject> {
        Python::with_gil(|py| {
            self.callable
                .call1(py, (boxes_to_list(py, boxes),))
                .map_err(|e| BatchError::Encode(e.to_string()))
        })
    }
}

/// Indefinite batch generator with box-consistent augmentation
#[pyclass(name = "BatchGenerator", unsendable)]
pub struct PyBatchGenerator {
    inner: BatchGenerator<PyObject>,
}

#[pymethods]
impl PyBatchGenerator {
    #[new]
    #[allow(clippy::too_many_arguments, clippy::needless_pass_by_value)]
    #[pyo3(signature = (labels_path, images_dir, include_classes, input_format=None, coco=false, seed=None, encoder=None))]
    pub fn new(
        labels_path: String,
        images_dir: String,
        include_classes: Vec<i64>,
        input_format: Option<Vec<String>>,
        coco: bool,
        seed: Option<u64>,
        encoder: Option<PyObject>,
    ) -> PyResult<Self> {
        let classes = ClassMap::new(&include_classes).map_err(to_py_err)?;
        let source: Box<dyn LabelSource> = if coco {
            Box::new(CocoLabelSource::new(&labels_path))
        } else {
            let format = match input_format {
                Some(names) => InputFormat::from_names(names.as_slice()).map_err(to_py_err)?,
                None => InputFormat::default(),
            };
            Box::new(CsvLabelSource::new(&labels_path, format))
        };

        let mut inner = BatchGenerator::from_source(
            source.as_ref(),
            &classes,
            FileImageLoader::new(images_dir),
            seed,
        )
        .map_err(to_py_err)?;
        if let Some(callable) = encoder {
            inner.set_encoder(Box::new(PyLabelEncoder { callable }));
        }
        Ok(PyBatchGenerator { inner })
    }

    /// Set the transforms from a JSON object; missing keys are disabled
    pub fn configure(&mut self, config_json: &str) -> PyResult<()> {
        let config = TransformConfig::from_json_str(config_json).map_err(to_py_err)?;
        self.inner.configure(config).map_err(to_py_err)
    }

    /// Set the callable that turns a list of `k x 5` box arrays into training targets
    pub fn set_encoder(&mut self, encoder: PyObject) {
        self.inner
            .set_encoder(Box::new(PyLabelEncoder { callable: encoder }));
    }

    /// `(images, targets)` when training, `(images, boxes, filenames)` otherwise.
    ///
    /// Images come back as one `N x H x W x C` array when their shapes agree, else as a list.
    #[pyo3(signature = (batch_size, train=true))]
    pub fn next_batch(
        &mut self,
        py: Python<'_>,
        batch_size: usize,
        train: bool,
    ) -> PyResult<PyObject> {
        let mode = if train {
            BatchMode::Train
        } else {
            BatchMode::Infer
        };
        let batch = self.inner.next_batch(batch_size, mode).map_err(to_py_err)?;

        let images: PyObject = match batch.stack_images() {
            Ok(stacked) => stacked.into_pyarray_bound(py).into_any().unbind(),
            Err(_) => PyList::new_bound(
                py,
                batch
                    .images
                    .iter()
                    .map(|img| img.clone().into_pyarray_bound(py)),
            )
            .into_any()
            .unbind(),
        };

        if let Ok(logging) = py.import_bound("logging") {
            let log_msg = format!(
                "Batch: requested={batch_size} | returned={} | pass={}",
                batch.len(),
                self.inner.pass()
            );
            let _ = logging.call_method1("debug", (log_msg,));
        }

        Ok(match batch.labels {
            BatchLabels::Encoded(targets) => (images, targets).into_py(py),
            BatchLabels::Boxes { boxes, filenames } => {
                (images, boxes_to_list(py, &boxes), filenames).into_py(py)
            }
        })
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.inner.sample_count()
    }

    /// Number of passes over the dataset started so far
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.inner.pass()
    }

    pub fn __len__(&self) -> usize {
        self.inner.sample_count()
    }
}
