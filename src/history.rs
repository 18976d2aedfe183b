use crate::error::{CosegError, Result};
use crate::frame::{Frame, LabelMask};

/// Inputs and outputs of the previously processed frame
///
/// Only one frame is kept per stream; longer-term statistics belong in the
/// algorithm's own model.
#[derive(Debug, Clone)]
pub struct FrameHistory<L, const N: usize, const M: usize> {
    last: Option<([Frame; N], [LabelMask<L>; M])>,
}

impl<L, const N: usize, const M: usize> Default for FrameHistory<L, N, M> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<L, const N: usize, const M: usize> FrameHistory<L, N, M> {
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    pub fn record(&mut self, inputs: [Frame; N], masks: [LabelMask<L>; M]) {
        self.last = Some((inputs, masks));
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn take(&mut self) -> Option<([Frame; N], [LabelMask<L>; M])> {
        self.last.take()
    }

    pub fn last_inputs(&self) -> Option<&[Frame; N]> {
        self.last.as_ref().map(|(inputs, _)| inputs)
    }

    pub fn last_masks(&self) -> Option<&[LabelMask<L>; M]> {
        self.last.as_ref().map(|(_, masks)| masks)
    }

    pub fn last_input(&self, stream: usize) -> Result<&Frame> {
        check_stream(stream, N)?;
        self.last_inputs()
            .map(|inputs| &inputs[stream])
            .ok_or(CosegError::NoHistory { stream })
    }

    pub fn last_mask(&self, stream: usize) -> Result<&LabelMask<L>> {
        check_stream(stream, M)?;
        self.last_masks()
            .map(|masks| &masks[stream])
            .ok_or(CosegError::NoHistory { stream })
    }
}

fn check_stream(index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(CosegError::StreamIndex { index, count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_reports_missing_frame() {
        let history = FrameHistory::<u8, 2, 1>::default();
        assert!(history.is_empty());
        assert!(matches!(
            history.last_input(1),
            Err(CosegError::NoHistory { stream: 1 })
        ));
        assert!(matches!(
            history.last_mask(0),
            Err(CosegError::NoHistory { stream: 0 })
        ));
    }

    #[test]
    fn out_of_range_streams_are_rejected() {
        let history = FrameHistory::<u8, 2, 1>::default();
        assert!(matches!(
            history.last_mask(1),
            Err(CosegError::StreamIndex { index: 1, count: 1 })
        ));
        assert!(matches!(
            history.last_input(2),
            Err(CosegError::StreamIndex { index: 2, count: 2 })
        ));
    }

    #[test]
    fn keeps_only_latest_frame() {
        let mut history = FrameHistory::<u8, 1, 1>::default();
        history.record([Frame::zeros((2, 2, 1))], [LabelMask::zeros((2, 2))]);
        history.record(
            [Frame::from_elem((2, 2, 1), 0.5)],
            [LabelMask::from_elem((2, 2), 3)],
        );

        assert_eq!(history.last_input(0).unwrap()[[1, 1, 0]], 0.5);
        assert_eq!(history.last_mask(0).unwrap()[[0, 0]], 3);

        history.clear();
        assert!(history.last_mask(0).is_err());
    }
}
