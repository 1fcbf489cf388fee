use std::sync::Arc;
use std::time::Duration;

use freertos_abstract::sync::Queue;
use freertos_abstract::task::AsyncJob;
use freertos_abstract::Allocator;

#[global_allocator]
static ALLOC: Allocator = Allocator;

#[test]
fn collections_allocate_from_the_kernel_heap() {
  let mut v = vec![1u8, 2, 3];
  v.extend_from_slice(&[4; 100]);
  assert_eq!(v.len(), 103);

  let s = format!("{}-{}", "heap", v[0]);
  assert_eq!(s, "heap-1");
}

#[test]
fn kernel_objects_work_on_the_kernel_heap() {
  let queue = Arc::new(Queue::<Box<u32>, 4>::new());

  let job = {
    let queue = Arc::clone(&queue);
    AsyncJob::spawn(move || {
      queue.try_push_back(Box::new(42)).unwrap();
    })
  };
  job.join();

  let mut consumer = queue.consumer().unwrap();
  assert_eq!(consumer.front(Duration::ZERO).map(|item| **item), Some(42));
  assert!(consumer.pop());
}

#[test]
fn over_aligned_allocations_succeed() {
  #[repr(align(128))]
  struct CacheLine([u8; 128]);

  let line = Box::new(CacheLine([7; 128]));
  assert_eq!(&*line as *const CacheLine as usize % 128, 0);
  assert_eq!(line.0[127], 7);

  let (tx, rx) = std::sync::mpsc::channel();
  tx.send(line).unwrap();
  assert_eq!(rx.recv().unwrap().0[0], 7);
}
