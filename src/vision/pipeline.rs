use crate::app_config::PipelineSettings;
use crate::errors::AppError;
use opencv::core::{self as cv, Mat, Point, Scalar, Size, Vec3b, Vec4i, Vector};
use opencv::imgproc;
use opencv::prelude::*;

pub struct PipelineOutput {
    /// Input frame with the contours drawn on it.
    pub output: Mat,
    pub binary: Mat,
    pub contours: Vector<Vector<Point>>,
    /// HSV of the sample pixel, if the frame is large enough to contain it.
    pub center_color: Option<[f64; 3]>,
}

/// HSV threshold, close + erode, external contours. Stateless between frames.
pub struct ObjectDetectPipeline {
    settings: PipelineSettings,
    kernel: Mat,
}

fn scalar(v: [f64; 3]) -> Scalar {
    Scalar::new(v[0], v[1], v[2], 0.0)
}

impl ObjectDetectPipeline {
    pub fn new(settings: PipelineSettings) -> Result<Self, AppError> {
        if settings.kernel_size < 1 {
            return Err(AppError::Config(format!("kernel size must be positive, got {}", settings.kernel_size)));
        }
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_RECT,
            Size::new(settings.kernel_size, settings.kernel_size),
            Point::new(-1, -1),
        )?;
        Ok(ObjectDetectPipeline { settings, kernel })
    }

    pub fn process(&self, input: &Mat) -> Result<PipelineOutput, AppError> {
        let mut output = input.try_clone()?;

        let mut hsv = Mat::default();
        imgproc::cvt_color_def(input, &mut hsv, imgproc::COLOR_BGR2HSV)?;

        let mut thresholded = Mat::default();
        cv::in_range(&hsv, &scalar(self.settings.hsv_lower), &scalar(self.settings.hsv_upper), &mut thresholded)?;

        let border_value = imgproc::morphology_default_border_value()?;
        let mut closed = Mat::default();
        imgproc::morphology_ex(
            &thresholded,
            &mut closed,
            imgproc::MORPH_CLOSE,
            &self.kernel,
            Point::new(-1, -1),
            1,
            cv::BORDER_CONSTANT,
            border_value,
        )?;
        let mut binary = Mat::default();
        imgproc::erode(
            &closed,
            &mut binary,
            &self.kernel,
            Point::new(-1, -1),
            self.settings.erode_iterations,
            cv::BORDER_CONSTANT,
            border_value,
        )?;

        let mut contours = Vector::<Vector<Point>>::new();
        let mut hierarchy = Vector::<Vec4i>::new();
        imgproc::find_contours_with_hierarchy(
            &binary,
            &mut contours,
            &mut hierarchy,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        imgproc::draw_contours(
            &mut output,
            &contours,
            -1,
            scalar(self.settings.contour_color_bgr),
            self.settings.contour_thickness,
            imgproc::LINE_8,
            &hierarchy,
            i32::MAX,
            Point::new(0, 0),
        )?;

        let center_color = self.sample(&hsv)?;
        Ok(PipelineOutput {
            output,
            binary,
            contours,
            center_color,
        })
    }

    fn sample(&self, hsv: &Mat) -> Result<Option<[f64; 3]>, AppError> {
        let (row, col) = (self.settings.sample_row, self.settings.sample_col);
        if row < 0 || col < 0 || row >= hsv.rows() || col >= hsv.cols() {
            return Ok(None);
        }
        let px = hsv.at_2d::<Vec3b>(row, col)?;
        Ok(Some([px[0] as f64, px[1] as f64, px[2] as f64]))
    }
}
