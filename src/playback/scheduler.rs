// Frame scheduler - Cooperative per-frame tick with an explicit cancellation handle
//
// The host calls the controller once per display frame; the controller only
// does work while the handle it was given at play() is still the active one.

/// Handle for one scheduled run of the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    next_id: u64,
    active: Option<FrameHandle>,
    frames: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new loop, cancelling any previous one
    pub fn start(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.active = Some(handle);
        self.frames = 0;
        handle
    }

    /// Cancel the active loop; returns whether one was running
    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }

    pub fn active(&self) -> Option<FrameHandle> {
        self.active
    }

    pub fn is_active(&self, handle: FrameHandle) -> bool {
        self.active == Some(handle)
    }

    /// Count a frame for the active loop; false when nothing is scheduled
    pub fn begin_frame(&mut self) -> bool {
        if self.active.is_some() {
            self.frames += 1;
            true
        } else {
            false
        }
    }

    /// Frames run since the active loop started
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
