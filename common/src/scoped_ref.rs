/// Runs a closure when dropped, unless dismissed first.
#[derive(Debug)]
pub struct ScopeRef<F>
where
    F: FnOnce(),
{
    on_drop: Option<F>,
}

impl<F> ScopeRef<F>
where
    F: FnOnce(),
{
    pub fn new(on_drop: F) -> Self {
        Self {
            on_drop: Some(on_drop),
        }
    }

    pub fn dismiss(mut self) {
        self.on_drop = None;
    }
}

impl<F> Drop for ScopeRef<F>
where
    F: FnOnce(),
{
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}
