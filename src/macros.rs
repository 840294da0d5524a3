#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// Poisoned locks surface as [`crate::Error::LockError`].
///
/// ```rust, ignore
///  let data = read_lock!(my_arc_rwlock)?;
///  println!("{}", data.some_field);
/// ```
macro_rules! read_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.read().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut data = write_lock!(my_arc_rwlock)?;
///  data.some_field = 42;
/// ```
macro_rules! write_lock {
    ($arc_rwlock:expr) => {
        $arc_rwlock.write().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for reading locked items through a closure
///
/// ```rust, ignore
///  let name = with_read!(store, |state| state.name.clone())?;
/// ```
macro_rules! with_read {
    ($arc_rwlock:expr, $closure:expr) => {{
        read_lock!($arc_rwlock).map(|guard| $closure(&*guard))
    }};
}

/// Helper macro for writing to locked items through a closure
///
/// ```rust, ignore
///  with_write!(store, |state| state.writes.push(path))?;
/// ```
macro_rules! with_write {
    ($arc_rwlock:expr, $closure:expr) => {{
        write_lock!($arc_rwlock).map(|mut guard| $closure(&mut *guard))
    }};
}
