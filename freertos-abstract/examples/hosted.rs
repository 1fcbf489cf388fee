use core::time::Duration;
use std::sync::Arc;

use freertos_abstract::sync::{BinarySemaphore, Queue};
use freertos_abstract::task::{AsyncJob, Scheduler, Task, TaskPriority};
use freertos_abstract::timer::Timer;
use freertos_abstract::{TimerDelay, WAIT_FOREVER};

fn main() {
  env_logger::init();

  println!("Starting application ...");

  let queue = Arc::new(Queue::<u32, 8>::new());
  let tick = Arc::new(BinarySemaphore::new());

  let timer = {
    let tick = Arc::clone(&tick);
    Timer::build()
      .name("tick")
      .period(Duration::from_millis(100))
      .create(move |_| {
        let _ = tick.give();
      })
  };
  timer.start(WAIT_FOREVER).unwrap();

  let producer = {
    let queue = Arc::clone(&queue);
    let tick = Arc::clone(&tick);
    Task::new()
      .name("producer")
      .priority(TaskPriority::new(2).unwrap())
      .start(move |_| {
        for i in 0..10 {
          tick.take(WAIT_FOREVER).unwrap();
          if queue.try_push_back(i).is_err() {
            println!("Queue full, dropping {}", i);
          }
        }
      })
  };
  println!("Task {} started.", producer.name());

  let consumer = {
    let queue = Arc::clone(&queue);
    AsyncJob::spawn(move || {
      let mut consumer = queue.consumer().unwrap();
      let mut delay = TimerDelay::new(true);

      let mut received = 0;
      while received < 10 {
        while let Some(item) = consumer.front(Duration::ZERO) {
          println!("Received {}", item);
          consumer.pop();
          received += 1;
        }
        delay.wait(Duration::from_millis(50));
      }

      Scheduler::stop();
    })
  };

  println!("Starting scheduler.");
  Scheduler::start();

  drop(consumer);
  println!("Done after {:?}.", Duration::from(Scheduler::tick_count()));
}
