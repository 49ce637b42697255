use std::fmt::{Display, Error, Formatter};

pub fn disp_iter<T: Display>(f: &mut Formatter<'_>, iterable: impl IntoIterator<Item = T>, sep: &str) -> Result<(), Error> {
    let mut i = iterable.into_iter();
    if let Some(first) = i.next() {
        write!(f, "{first}")?;
        for other in i {
            write!(f, "{sep}")?;
            write!(f, "{other}")?;
        }
    }
    Ok(())
}

pub fn disp_slice<T: Display>(f: &mut Formatter<'_>, iterable: &[T], sep: &str) -> Result<(), Error> {
    disp_iter(f, iterable.iter(), sep)
}
