/// Progress through a paginated listing.
///
/// The total page count is only known once a page has been received, so the
/// bound is re-evaluated on every transition instead of being fixed upfront.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Fetching,
    HasMore { next: u32, total: u32 },
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub struct PageCursor {
    state: PageState,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageCursor {
    pub fn new() -> Self {
        PageCursor {
            state: PageState::Fetching,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// The 1-indexed page to request next, or `None` once exhausted.
    pub fn next_page(&self) -> Option<u32> {
        match self.state {
            PageState::Fetching => Some(1),
            PageState::HasMore { next, .. } => Some(next),
            PageState::Exhausted => None,
        }
    }

    /// Records that `fetched` was received along with the reported total.
    /// An absent total means the page just received was the whole result.
    pub fn advance(&mut self, fetched: u32, total: Option<u32>) {
        let total = total.unwrap_or(1);
        self.state = if fetched < total {
            PageState::HasMore {
                next: fetched + 1,
                total,
            }
        } else {
            PageState::Exhausted
        };
    }
}
