/// A single independently-timed playable audio primitive.
///
/// Each block with media owns one of these. The resource keeps its own clock
/// once playing; the scheduler only decides when to start, stop and reseek it.
pub trait PlayableResource {
    fn play(&mut self) -> anyhow::Result<()>;

    fn pause(&mut self);

    /// Move the resource's internal position to `offset_secs` from the start
    /// of its media.
    fn seek(&mut self, offset_secs: f64) -> anyhow::Result<()>;

    /// Linear gain in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32);

    /// Media length once it is known.
    fn duration(&self) -> Option<f64>;

    fn is_playing(&self) -> bool;
}

/// Opens playable resources from media references.
pub trait ResourceBackend {
    fn load(&mut self, reference: &str) -> anyhow::Result<Box<dyn PlayableResource>>;
}

impl<B: ResourceBackend + ?Sized> ResourceBackend for Box<B> {
    fn load(&mut self, reference: &str) -> anyhow::Result<Box<dyn PlayableResource>> {
        (**self).load(reference)
    }
}
