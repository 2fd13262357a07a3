//! Shared plumbing for YOLO pose models run through ONNX Runtime.
//!
//! Both the face model (5 keypoints) and the hand model (21 keypoints) use
//! the same output layout: one row per candidate with
//! `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`, possibly transposed.
use std::path::Path;

use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox pad value (114/255 gray, YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A loaded YOLO pose model and its square input resolution.
pub struct YoloSession {
    session: ort::session::Session,
    input_size: u32,
}

impl YoloSession {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn load(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Letterboxes the frame, runs inference and decodes every candidate
    /// scoring at least `confidence`, in frame pixel coordinates.
    pub fn infer(
        &mut self,
        frame: &Frame,
        num_keypoints: usize,
        confidence: f64,
    ) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let Letterbox { tensor, mapping } = letterbox(frame, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        decode(data, &shape, num_keypoints, confidence, &mapping)
    }
}

/// Letterboxed model input plus the mapping back to frame pixels.
pub struct Letterbox {
    pub tensor: ndarray::Array4<f32>,
    pub mapping: LetterboxMapping,
}

/// Scale and padding applied by [`letterbox`].
#[derive(Clone, Copy, Debug)]
pub struct LetterboxMapping {
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl LetterboxMapping {
    /// Maps a point from model input coordinates back to frame pixels.
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// One decoded candidate, in frame pixel coordinates.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    /// `(x, y, confidence)` per keypoint, in model order.
    pub keypoints: Vec<(f64, f64, f64)>,
}

impl RawDetection {
    fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`, NCHW float32.
///
/// Fails on empty or non-RGB frames.
pub fn letterbox(frame: &Frame, target_size: u32) -> Result<Letterbox, Box<dyn std::error::Error>> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(format!(
            "Cannot run inference on an empty {}x{} frame",
            frame.width(),
            frame.height()
        )
        .into());
    }
    if frame.channels() != 3 {
        return Err(format!("Expected an RGB frame, got {} channels", frame.channels()).into());
    }
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok(Letterbox {
        tensor,
        mapping: LetterboxMapping {
            scale,
            pad_x,
            pad_y,
        },
    })
}

/// Decodes a `[1, F, N]` or `[1, N, F]` output into candidates above `confidence`.
pub fn decode(
    data: &[f32],
    shape: &[usize],
    num_keypoints: usize,
    confidence: f64,
    mapping: &LetterboxMapping,
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    // Feature axis is the shorter one
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        )
        .into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let has_keypoints = num_feats >= 5 + num_keypoints * 3;
    let mut dets = Vec::new();
    for i in 0..num_dets {
        if num_feats < 5 {
            break;
        }
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }

        let cx = value(i, 0);
        let cy = value(i, 1);
        let w = value(i, 2);
        let h = value(i, 3);
        let (x1, y1) = mapping.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = mapping.to_frame(cx + w / 2.0, cy + h / 2.0);

        let keypoints = if has_keypoints {
            (0..num_keypoints)
                .map(|k| {
                    let (kx, ky) = mapping.to_frame(value(i, 5 + k * 3), value(i, 5 + k * 3 + 1));
                    (kx, ky, value(i, 5 + k * 3 + 2))
                })
                .collect()
        } else {
            Vec::new()
        };

        dets.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
            keypoints,
        });
    }
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
pub fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if bbox_iou(&dets[i].bbox(), &dets[j].bbox()) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
