//! ExtractExtent: keep a volume of interest of an image.

use crate::data::{DataBody, DataObject, DataType, Extent};
use crate::pipeline::{
    input_data, input_information, Algorithm, AlgorithmBase, Information, PipelineError,
    PipelineResult, PortLayout, Request,
};
use std::sync::Arc;

/// Passes through the part of the input image inside `voi`, and asks
/// upstream for no more than that.
pub struct ExtractExtent {
    base: AlgorithmBase,
    voi: Extent,
}

impl ExtractExtent {
    pub fn new(voi: Extent) -> Self {
        Self {
            base: AlgorithmBase::new(PortLayout::filter(DataType::ImageData, DataType::ImageData)),
            voi,
        }
    }

    pub fn set_voi(&mut self, voi: Extent) {
        if self.voi != voi {
            self.voi = voi;
            self.base.modified();
        }
    }

    pub fn voi(&self) -> Extent {
        self.voi
    }

    fn output_extent(&self, inputs: &[Vec<Information>]) -> Extent {
        let whole = input_information(inputs, 0)
            .and_then(|info| info.whole_extent)
            .unwrap_or(Extent::EMPTY);
        self.voi.clamped_to(&whole)
    }
}

impl Algorithm for ExtractExtent {
    fn class_name(&self) -> &str {
        "ExtractExtent"
    }

    fn base(&self) -> &AlgorithmBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AlgorithmBase {
        &mut self.base
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let extent = self.output_extent(inputs);
        for out in outputs.iter_mut() {
            out.whole_extent = Some(extent);
        }
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let voi = self.output_extent(inputs);
        let wanted = outputs
            .get(request.output_port())
            .and_then(|out| out.update_extent)
            .unwrap_or(voi)
            .clamped_to(&voi);
        for input in inputs.iter_mut().flatten() {
            input.update_extent = Some(wanted);
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        inputs: &mut [Vec<Information>],
        outputs: &mut [Information],
    ) -> PipelineResult<()> {
        let voi = self.output_extent(inputs);
        let input = input_data(inputs, 0).ok_or(PipelineError::MissingInput {
            algorithm: "ExtractExtent".to_string(),
            port: 0,
        })?;
        let image = input.as_image_data().cloned().ok_or(PipelineError::PortMismatch {
            algorithm: "ExtractExtent".to_string(),
            port: 0,
            required: DataType::ImageData,
            actual: input.data_type(),
        })?;
        let time_step = input.info.time_step;

        let out = outputs.get_mut(0).ok_or(PipelineError::MissingDataObject {
            algorithm: "ExtractExtent".to_string(),
            port: 0,
        })?;
        let target = out.update_extent.unwrap_or(voi).clamped_to(&voi);

        let mut data = DataObject::from_body(DataBody::ImageData(image));
        data.crop(&target);
        data.info.time_step = time_step;
        out.data_object = Some(Arc::new(data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ImageSource;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_publishes_clamped_voi_as_whole_extent() {
        let mut p = Pipeline::default();
        let src = p.add_algorithm(ImageSource::new([4, 4, 1]));
        let voi = p.add_algorithm(ExtractExtent::new(Extent::new(1, 9, 1, 2, 0, 0)));
        p.connect(src, 0, voi, 0).unwrap();
        p.update_information(voi).unwrap();
        assert_eq!(p.whole_extent(voi, 0), Some(Extent::new(1, 3, 1, 2, 0, 0)));
    }

    #[test]
    fn test_requests_only_voi_upstream() {
        let mut p = Pipeline::default();
        let src = p.add_algorithm(ImageSource::new([10, 10, 10]));
        let voi = p.add_algorithm(ExtractExtent::new(Extent::new(2, 4, 2, 4, 2, 4)));
        p.connect(src, 0, voi, 0).unwrap();
        p.update(voi).unwrap();

        let upstream = p.output(src, 0).unwrap();
        assert_eq!(upstream.info.extent, Some(Extent::new(2, 4, 2, 4, 2, 4)));
        let out = p.output(voi, 0).unwrap();
        let image = out.as_image_data().unwrap();
        assert_eq!(image.extent, Extent::new(2, 4, 2, 4, 2, 4));
        assert_eq!(image.scalar_at("scalars", 4, 4, 4), Some(12.0));
    }

    #[test]
    fn test_moving_the_voi_moves_the_request() {
        let mut p = Pipeline::default();
        let src = p.add_algorithm(ImageSource::new([10, 10, 1]));
        let voi = p.add_algorithm(ExtractExtent::new(Extent::new(0, 2, 0, 2, 0, 0)));
        p.connect(src, 0, voi, 0).unwrap();
        p.update(voi).unwrap();

        let moved = Extent::new(5, 8, 5, 8, 0, 0);
        p.algorithm_mut::<ExtractExtent>(voi).unwrap().set_voi(moved);
        p.update(voi).unwrap();

        assert_eq!(p.algorithm::<ExtractExtent>(voi).unwrap().voi(), moved);
        assert_eq!(p.whole_extent(voi, 0), Some(moved));
        let out = p.output(voi, 0).unwrap();
        assert_eq!(out.as_image_data().unwrap().extent, moved);
        // Requests on one output are combined, so the source may deliver more.
        let delivered = p.output(src, 0).unwrap().info.extent.unwrap();
        assert!(delivered.contains(&moved));
    }
}
