// Scoped handle - one owned Vulkan object plus the exact call that frees it
//
// Vulkan destroy functions usually need the parent (instance, device or an
// extension loader). The release closure captures a clone of that parent's
// function table at construction time, so the handle can free itself from
// `Drop` without borrowing anything.
//
// Ordering between handles is the owner's job: keep them in struct fields
// (or locals) declared in creation order and let Rust drop them in reverse.

use std::fmt;
use std::ops::Deref;

/// A native handle that is released exactly once.
///
/// `T::default()` is the empty value (`VK_NULL_HANDLE` for every `ash`
/// handle type). Releasing an empty handle does nothing, and the stored value
/// is reset to empty right after the release closure runs, so the closure
/// never sees the same acquired value twice.
pub struct ScopedHandle<T>
where
    T: Copy + PartialEq + Default,
{
    value: T,
    release: Box<dyn FnMut(T)>,
}

impl<T> ScopedHandle<T>
where
    T: Copy + PartialEq + Default,
{
    /// A handle with nothing to release.
    pub fn empty() -> Self {
        Self::new(|_| {})
    }

    /// Bind a plain destroy function.
    pub fn new(release: impl FnMut(T) + 'static) -> Self {
        Self {
            value: T::default(),
            release: Box::new(release),
        }
    }

    /// Bind a destroy function that needs its parent at free time.
    pub fn with_owner<O: 'static>(owner: O, release: impl Fn(&O, T) + 'static) -> Self {
        Self::new(move |value| release(&owner, value))
    }

    /// Store `value`, releasing the current handle first.
    ///
    /// Assigning the value already held is a no-op.
    pub fn assign(&mut self, value: T) {
        if value != self.value {
            self.release();
            self.value = value;
        }
    }

    /// Release the current handle and hand out the slot for a creation call
    /// to write into.
    pub fn replace(&mut self) -> &mut T {
        self.release();
        &mut self.value
    }

    /// Release now instead of at drop.
    pub fn release(&mut self) {
        if !self.is_empty() {
            let value = std::mem::take(&mut self.value);
            (self.release)(value);
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    /// Address of the stored value, for calls that read through a pointer.
    pub fn as_ptr(&self) -> *const T {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value == T::default()
    }
}

impl<T> Deref for ScopedHandle<T>
where
    T: Copy + PartialEq + Default,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for ScopedHandle<T>
where
    T: Copy + PartialEq + Default,
{
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> fmt::Debug for ScopedHandle<T>
where
    T: Copy + PartialEq + Default + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedHandle").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::{self, Handle};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording() -> (Rc<RefCell<Vec<u64>>>, ScopedHandle<u64>) {
        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&released);
        let handle = ScopedHandle::new(move |value| sink.borrow_mut().push(value));
        (released, handle)
    }

    #[test]
    fn empty_handle_releases_nothing() {
        let (released, handle) = recording();
        assert!(handle.is_empty());
        drop(handle);
        assert!(released.borrow().is_empty());

        drop(ScopedHandle::<vk::Fence>::empty());
    }

    #[test]
    fn drop_releases_exactly_once() {
        let (released, mut handle) = recording();
        handle.assign(42);
        assert_eq!(handle.get(), 42);
        drop(handle);
        assert_eq!(*released.borrow(), vec![42]);
    }

    #[test]
    fn explicit_release_then_drop_does_not_double_free() {
        let (released, mut handle) = recording();
        handle.assign(5);
        handle.release();
        handle.release();
        assert!(handle.is_empty());
        drop(handle);
        assert_eq!(*released.borrow(), vec![5]);
    }

    #[test]
    fn assign_releases_previous_value() {
        let (released, mut handle) = recording();
        handle.assign(1);
        handle.assign(2);
        assert_eq!(*released.borrow(), vec![1]);
        drop(handle);
        assert_eq!(*released.borrow(), vec![1, 2]);
    }

    #[test]
    fn self_assignment_is_a_no_op() {
        let (released, mut handle) = recording();
        handle.assign(9);
        handle.assign(9);
        assert!(released.borrow().is_empty());
        assert_eq!(*handle, 9);
    }

    #[test]
    fn replace_frees_before_handing_out_the_slot() {
        let (released, mut handle) = recording();
        handle.assign(3);
        *handle.replace() = 4;
        assert_eq!(*released.borrow(), vec![3]);
        assert_eq!(handle.get(), 4);

        // Nothing to free the first time round.
        let (released_fresh, mut fresh) = recording();
        *fresh.replace() = 11;
        assert!(released_fresh.borrow().is_empty());
        drop(fresh);
        assert_eq!(*released_fresh.borrow(), vec![11]);
    }

    #[test]
    fn owner_is_passed_to_the_release_call() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let owner = ("device", Rc::clone(&released));
        let mut handle = ScopedHandle::with_owner(owner, |(name, sink), view: vk::ImageView| {
            sink.borrow_mut().push(format!("{name}:{}", view.as_raw()));
        });
        handle.assign(vk::ImageView::from_raw(17));
        drop(handle);
        assert_eq!(*released.borrow(), vec!["device:17".to_string()]);
    }

    #[test]
    fn owner_release_may_ignore_the_handle() {
        let calls = Rc::new(RefCell::new(0));
        let mut handle = ScopedHandle::with_owner(Rc::clone(&calls), |calls: &Rc<RefCell<u32>>, _: vk::Instance| {
            *calls.borrow_mut() += 1;
        });
        handle.assign(vk::Instance::from_raw(3));
        drop(handle);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn as_ptr_reads_without_clearing() {
        let (released, mut handle) = recording();
        handle.assign(8);
        let read = unsafe { *handle.as_ptr() };
        assert_eq!(read, 8);
        assert!(released.borrow().is_empty());
    }

    #[test]
    fn counting_deleter_sees_each_value_once() {
        let (released, mut handle) = recording();
        for value in [1, 1, 2, 3, 3, 3, 4] {
            handle.assign(value);
        }
        drop(handle);
        assert_eq!(*released.borrow(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn moved_handle_is_released_by_its_new_owner_only() {
        let (released, mut handle) = recording();
        handle.assign(21);
        let holder = vec![handle];
        assert!(released.borrow().is_empty());
        drop(holder);
        assert_eq!(*released.borrow(), vec![21]);
    }
}
