/// Two-stage expression model on ONNX Runtime via `ort`.
///
/// Stage one locates the most confident face with a YOLO face detector;
/// stage two classifies a 64x64 grayscale crop of that face with FER+.
use std::path::{Path, PathBuf};

use crate::emotion::domain::emotion::Emotion;
use crate::emotion::domain::expression_model::{ExpressionModel, ModelLoader};
use crate::emotion::domain::prediction::ExpressionScores;
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, EXPRESSION_MODEL, FACE_MODEL};

/// Fallback face-detector input resolution when the model doesn't specify one.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default face confidence threshold.
pub const DEFAULT_FACE_CONFIDENCE: f64 = 0.5;

/// FER+ input edge length in pixels.
const EXPRESSION_INPUT_SIZE: usize = 64;

/// FER+ output order. `None` marks contempt, which has no label of its own
/// and is folded into disgusted.
const FERPLUS_LABELS: [Option<Emotion>; 8] = [
    Some(Emotion::Neutral),
    Some(Emotion::Happy),
    Some(Emotion::Surprised),
    Some(Emotion::Sad),
    Some(Emotion::Angry),
    Some(Emotion::Disgusted),
    Some(Emotion::Fearful),
    None,
];

/// Face detector + expression classifier backed by two `ort` sessions.
pub struct OnnxExpressionModel {
    face_session: ort::session::Session,
    expression_session: ort::session::Session,
    face_input_size: u32,
    confidence: f64,
}

impl OnnxExpressionModel {
    pub fn new(
        face_model_path: &Path,
        expression_model_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let face_session = open_session(face_model_path)?;
        let expression_session = open_session(expression_model_path)?;

        // NCHW: [1, 3, H, W]; square input expected.
        let face_input_size = face_session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            face_session,
            expression_session,
            face_input_size,
            confidence,
        })
    }

    /// Bounding box `[x1, y1, x2, y2]` of the most confident face.
    fn locate_face(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<[f64; 4]>, Box<dyn std::error::Error>> {
        let (input, scale, pad_x, pad_y) = letterbox(frame, self.face_input_size);
        let value = ort::value::Tensor::from_array(input)?;
        let outputs = self.face_session.run(ort::inputs![value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected face model output shape: {shape:?}").into());
        }
        let data: Vec<f32> = tensor.iter().copied().collect();

        let best = best_detection(&data, shape[1], shape[2], self.confidence);
        Ok(best.map(|(cx, cy, w, h)| {
            [
                (cx - w / 2.0 - pad_x) / scale,
                (cy - h / 2.0 - pad_y) / scale,
                (cx + w / 2.0 - pad_x) / scale,
                (cy + h / 2.0 - pad_y) / scale,
            ]
        }))
    }

    fn classify(
        &mut self,
        frame: &Frame,
        bbox: [f64; 4],
    ) -> Result<Option<ExpressionScores>, Box<dyn std::error::Error>> {
        let Some(patch) = frame.gray_patch(bbox, EXPRESSION_INPUT_SIZE) else {
            return Ok(None);
        };
        let input = patch.insert_axis(ndarray::Axis(0)).insert_axis(ndarray::Axis(0));
        let value = ort::value::Tensor::from_array(input)?;
        let outputs = self.expression_session.run(ort::inputs![value])?;
        if outputs.len() == 0 {
            return Err("expression model produced no outputs".into());
        }
        let logits: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        if logits.len() < FERPLUS_LABELS.len() {
            let expected = FERPLUS_LABELS.len();
            return Err(format!("expected {expected} logits, got {}", logits.len()).into());
        }
        Ok(Some(ferplus_scores(&softmax(&logits[..FERPLUS_LABELS.len()]))))
    }
}

impl ExpressionModel for OnnxExpressionModel {
    fn detect_expressions(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<ExpressionScores>, Box<dyn std::error::Error>> {
        match self.locate_face(frame)? {
            Some(bbox) => self.classify(frame, bbox),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "yolo-face+ferplus"
    }
}

/// Loads [`OnnxExpressionModel`], resolving missing model files through
/// [`model_resolver`] (bundled dir, cache, download).
pub struct OnnxModelLoader {
    face_model: Option<PathBuf>,
    expression_model: Option<PathBuf>,
    bundled_dir: Option<PathBuf>,
    confidence: f64,
}

impl OnnxModelLoader {
    pub fn new(bundled_dir: Option<PathBuf>) -> Self {
        Self {
            face_model: None,
            expression_model: None,
            bundled_dir,
            confidence: DEFAULT_FACE_CONFIDENCE,
        }
    }

    pub fn with_model_paths(mut self, face_model: PathBuf, expression_model: PathBuf) -> Self {
        self.face_model = Some(face_model);
        self.expression_model = Some(expression_model);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<Box<dyn ExpressionModel>, Box<dyn std::error::Error>> {
        let bundled = self.bundled_dir.as_deref();
        let face = match &self.face_model {
            Some(path) => path.clone(),
            None => model_resolver::resolve(FACE_MODEL, bundled, None)?,
        };
        let expression = match &self.expression_model {
            Some(path) => path.clone(),
            None => model_resolver::resolve(EXPRESSION_MODEL, bundled, None)?,
        };
        log::info!(
            "Loading expression model from {} and {}",
            face.display(),
            expression.display()
        );
        Ok(Box::new(OnnxExpressionModel::new(
            &face,
            &expression,
            self.confidence,
        )?))
    }
}

fn open_session(path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    Ok(ort::session::Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?)
}

/// Hardware providers tried before the CPU fallback on this platform.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Pre/post-processing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` x `target_size`, padding with
/// YOLO's 114 gray. Returns `(NCHW tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, f64, f64) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as usize;
    let new_h = (fh * scale).round() as usize;
    let pad_x = (target_size as usize - new_w) / 2;
    let pad_y = (target_size as usize - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), 114.0 / 255.0);
    let src = frame.as_ndarray();
    let max_x = frame.width() as usize - 1;
    let max_y = frame.height() as usize - 1;
    let gray_source = frame.channels() < 3;

    for y in 0..new_h {
        let sy = ((y as f64 / scale) as usize).min(max_y);
        for x in 0..new_w {
            let sx = ((x as f64 / scale) as usize).min(max_x);
            for c in 0..3 {
                let sc = if gray_source { 0 } else { c };
                tensor[[0, c, pad_y + y, pad_x + x]] = src[[sy, sx, sc]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x as f64, pad_y as f64)
}

/// Picks the highest-confidence row from a YOLO output of shape
/// `[1, dim1, dim2]`, accepting either `[features, detections]` or
/// `[detections, features]` layout. Returns `(cx, cy, w, h)` in letterbox
/// coordinates.
fn best_detection(
    data: &[f32],
    dim1: usize,
    dim2: usize,
    threshold: f64,
) -> Option<(f64, f64, f64, f64)> {
    let transposed = dim1 < dim2;
    let (num_dets, num_feats) = if transposed { (dim2, dim1) } else { (dim1, dim2) };
    if num_feats < 5 {
        return None;
    }
    let at = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    (0..num_dets)
        .map(|i| (i, at(i, 4)))
        .filter(|&(_, conf)| conf >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| (at(i, 0), at(i, 1), at(i, 2), at(i, 3)))
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

fn ferplus_scores(probabilities: &[f32]) -> ExpressionScores {
    let mut scores = ExpressionScores::new();
    for (label, &p) in FERPLUS_LABELS.iter().zip(probabilities) {
        scores.add(label.unwrap_or(Emotion::Disgusted), p);
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_softmax_sums_to_one_and_preserves_order() {
        let p = softmax(&[1.0, 3.0, 2.0]);
        assert_relative_eq!(p.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(p[1] > p[2] && p[2] > p[0]);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let p = softmax(&[1000.0, 1000.0]);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_ferplus_folds_contempt_into_disgusted() {
        let probs = [0.1, 0.2, 0.1, 0.1, 0.1, 0.15, 0.1, 0.15];
        let scores = ferplus_scores(&probs);
        assert_eq!(scores.len(), 7);
        assert_relative_eq!(scores.get(Emotion::Disgusted).unwrap(), 0.3, epsilon = 1e-6);
        assert_relative_eq!(scores.get(Emotion::Happy).unwrap(), 0.2, epsilon = 1e-6);
    }

    fn row_major(rows: &[[f32; 5]]) -> Vec<f32> {
        rows.iter().flatten().copied().collect()
    }

    #[test]
    fn test_best_detection_row_major() {
        // 6 detections x 5 features: [cx, cy, w, h, conf]
        let data = row_major(&[
            [10.0, 10.0, 4.0, 4.0, 0.6],
            [20.0, 20.0, 8.0, 8.0, 0.9],
            [30.0, 30.0, 2.0, 2.0, 0.2],
            [40.0, 40.0, 2.0, 2.0, 0.1],
            [50.0, 50.0, 2.0, 2.0, 0.7],
            [60.0, 60.0, 2.0, 2.0, 0.0],
        ]);
        let best = best_detection(&data, 6, 5, 0.5).unwrap();
        assert_eq!(best, (20.0, 20.0, 8.0, 8.0));
    }

    #[test]
    fn test_best_detection_transposed_layout() {
        // 5 features x 6 detections; detection 4 wins.
        let mut data = vec![0.0f32; 5 * 6];
        for det in 0..6 {
            data[det] = det as f32; // cx
            data[6 + det] = 1.0; // cy
            data[2 * 6 + det] = 2.0; // w
            data[3 * 6 + det] = 3.0; // h
            data[4 * 6 + det] = if det == 4 { 0.95 } else { 0.6 };
        }
        let best = best_detection(&data, 5, 6, 0.5).unwrap();
        assert_eq!(best, (4.0, 1.0, 2.0, 3.0));
    }

    #[test]
    fn test_best_detection_below_threshold_is_none() {
        let data = row_major(&[[10.0, 10.0, 4.0, 4.0, 0.3]; 6]);
        assert!(best_detection(&data, 6, 5, 0.5).is_none());
    }

    #[test]
    fn test_letterbox_pads_wide_frame_vertically() {
        let frame = Frame::new(vec![255u8; 8 * 4 * 3], 8, 4, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 16);
        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
        assert_relative_eq!(scale, 2.0);
        assert_relative_eq!(pad_x, 0.0);
        assert_relative_eq!(pad_y, 4.0);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0);
        assert_relative_eq!(tensor[[0, 0, 8, 8]], 1.0);
    }

    #[test]
    fn test_loader_with_missing_files_fails() {
        let loader = OnnxModelLoader::new(None).with_model_paths(
            PathBuf::from("/nonexistent/face.onnx"),
            PathBuf::from("/nonexistent/expr.onnx"),
        );
        assert!(loader.load().is_err());
    }
}
