use std::io::Stdout;

use pbr::{ProgressBar, Units};

/// Advances a byte progress bar as the wrapped input is consumed.
pub struct ProgressBarReporter<T> {
    pb: ProgressBar<Stdout>,
    inner: T,
}

impl<T> ProgressBarReporter<T>
where
    T: std::io::Read,
{
    pub fn new(total_bytes: u64, inner: T) -> Self {
        let mut pb = ProgressBar::new(total_bytes);
        pb.set_units(Units::Bytes);

        Self { pb, inner }
    }

    pub fn finish(&mut self) {
        self.pb.finish();
    }
}

impl<T> std::io::Read for ProgressBarReporter<T>
where
    T: std::io::Read,
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.pb.add(read as _);
        Ok(read)
    }
}
