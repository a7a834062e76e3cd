use std::future::Future;

use log::{debug, info, warn};

use crate::cancel::CancelToken;

use super::decode::{FrameAsset, FrameSource, FrameStrategy, StrategyKind};
use super::AcquireError;

/// Progress through the acquisition cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Unattempted,
    Trying(StrategyKind),
    Ready(StrategyKind),
    /// Every strategy failed; the scene renders without the texture.
    Exhausted,
    /// Teardown arrived first; any result was dropped.
    Cancelled,
}

/// Runs the strategies in order until one produces frames.
pub struct FrameAcquisition {
    strategies: Vec<Box<dyn FrameStrategy>>,
    state: AcquisitionState,
    failures: Vec<(StrategyKind, AcquireError)>,
    cancel: CancelToken,
}

impl FrameAcquisition {
    pub fn new(strategies: Vec<Box<dyn FrameStrategy>>, cancel: CancelToken) -> Self {
        Self {
            strategies,
            state: AcquisitionState::Unattempted,
            failures: Vec::new(),
            cancel,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn failures(&self) -> &[(StrategyKind, AcquireError)] {
        &self.failures
    }

    /// Tries each strategy left to right; the first success wins and later
    /// strategies are never consulted.
    pub fn run(&mut self, asset: &FrameAsset) -> Option<FrameSource> {
        for strategy in &self.strategies {
            if self.cancel.is_cancelled() {
                self.state = AcquisitionState::Cancelled;
                return None;
            }
            let kind = strategy.kind();
            self.state = AcquisitionState::Trying(kind);
            match strategy.acquire(asset) {
                Ok(mut source) => {
                    if self.cancel.is_cancelled() {
                        source.release();
                        self.state = AcquisitionState::Cancelled;
                        return None;
                    }
                    info!("animated texture ready via {}", kind.name());
                    self.state = AcquisitionState::Ready(kind);
                    return Some(source);
                }
                Err(err) => {
                    debug!("{} failed for {}: {err}", kind.name(), asset.url);
                    self.failures.push((kind, err));
                }
            }
        }
        warn!("no strategy could load {}; continuing without it", asset.url);
        self.state = AcquisitionState::Exhausted;
        None
    }

    /// Awaits the download, then runs the cascade. A teardown that lands
    /// while the download is pending suppresses everything after the await.
    pub async fn run_after<F>(&mut self, asset: FrameAsset, download: F) -> Option<FrameSource>
    where
        F: Future<Output = Option<Vec<u8>>>,
    {
        let bytes = download.await;
        if self.cancel.is_cancelled() {
            self.state = AcquisitionState::Cancelled;
            return None;
        }
        let asset = FrameAsset::new(asset.url, bytes, asset.frame_duration);
        self.run(&asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::decode::tests::RGB_GIF;
    use crate::frames::decode::{default_strategies, CompositingDecoder, PatchDecoder};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(50);

    /// Always fails and counts how often it was asked.
    struct Refusing {
        kind: StrategyKind,
        calls: Rc<Cell<u32>>,
    }

    impl FrameStrategy for Refusing {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn acquire(&self, _asset: &FrameAsset) -> Result<FrameSource, AcquireError> {
            self.calls.set(self.calls.get() + 1);
            Err(AcquireError::Unsupported("refused"))
        }
    }

    fn gif_asset() -> FrameAsset {
        FrameAsset::new("/fire.gif", Some(RGB_GIF.clone()), FRAME)
    }

    #[test]
    fn first_success_wins() {
        let mut acquisition = FrameAcquisition::new(default_strategies(), CancelToken::new());
        assert_eq!(acquisition.state(), AcquisitionState::Unattempted);
        assert!(acquisition.run(&gif_asset()).is_some());
        assert_eq!(
            acquisition.state(),
            AcquisitionState::Ready(StrategyKind::CompositingDecoder)
        );
        assert!(acquisition.failures().is_empty());
    }

    #[test]
    fn falls_through_to_next_strategy() {
        let calls = Rc::new(Cell::new(0));
        let later = Rc::new(Cell::new(0));
        let strategies: Vec<Box<dyn FrameStrategy>> = vec![
            Box::new(Refusing {
                kind: StrategyKind::CompositingDecoder,
                calls: Rc::clone(&calls),
            }),
            Box::new(PatchDecoder),
            Box::new(Refusing {
                kind: StrategyKind::LegacyElement,
                calls: Rc::clone(&later),
            }),
        ];
        let mut acquisition = FrameAcquisition::new(strategies, CancelToken::new());
        assert!(acquisition.run(&gif_asset()).is_some());
        assert_eq!(
            acquisition.state(),
            AcquisitionState::Ready(StrategyKind::FrameLibrary)
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(later.get(), 0);
    }

    #[test]
    fn exhausted_when_everything_fails() {
        let asset = FrameAsset::new("/fire.gif", Some(b"garbage".to_vec()), FRAME);
        let mut acquisition = FrameAcquisition::new(default_strategies(), CancelToken::new());
        assert!(acquisition.run(&asset).is_none());
        assert_eq!(acquisition.state(), AcquisitionState::Exhausted);
        assert_eq!(acquisition.failures().len(), 3);
    }

    #[test]
    fn teardown_during_download_drops_result() {
        let cancel = CancelToken::new();
        let mut acquisition =
            FrameAcquisition::new(vec![Box::new(CompositingDecoder)], cancel.clone());
        let download = async {
            cancel.cancel();
            Some(RGB_GIF.clone())
        };
        let asset = FrameAsset::new("/fire.gif", None, FRAME);
        let source = pollster::block_on(acquisition.run_after(asset, download));
        assert!(source.is_none());
        assert_eq!(acquisition.state(), AcquisitionState::Cancelled);
    }

    #[test]
    fn failed_download_still_reaches_the_cascade() {
        let mut acquisition = FrameAcquisition::new(default_strategies(), CancelToken::new());
        let asset = FrameAsset::new("/fire.gif", None, FRAME);
        let source = pollster::block_on(acquisition.run_after(asset, async { None }));
        assert!(source.is_none());
        assert_eq!(acquisition.state(), AcquisitionState::Exhausted);
    }
}
