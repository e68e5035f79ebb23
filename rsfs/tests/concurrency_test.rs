use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rsfs::{AccessMode, GeometryBuilder, Rsfs, RsfsError, Whence};

const THREADS: usize = 8;

fn shared_fs() -> Arc<Rsfs> {
  let _ = env_logger::builder().is_test(true).try_init();
  let geometry = GeometryBuilder::new()
    .with_block_size(32)
    .with_data_blocks(64)
    .with_inodes(THREADS + 1)
    .with_pointers_per_inode(5)
    .with_open_files(THREADS * 2)
    .build()
    .unwrap();
  Arc::new(Rsfs::new(geometry).expect("Could not initialize file system."))
}

#[test]
fn independent_files_from_many_threads() {
  let fs = shared_fs();

  let handles: Vec<_> = (0..THREADS)
    .map(|i| {
      let fs = Arc::clone(&fs);
      thread::spawn(move || {
        let name = format!("file-{}", i);
        let payload = vec![i as u8; 40 + i];
        for _ in 0..20 {
          fs.create(&name).unwrap();
          let fd = fs.open(&name, AccessMode::ReadWrite).unwrap();
          assert_eq!(fs.write(fd, &payload).unwrap(), payload.len());
          fs.fseek(fd, 0, Whence::Set).unwrap();
          let mut out = vec![0u8; payload.len()];
          assert_eq!(fs.read(fd, &mut out).unwrap(), payload.len());
          assert_eq!(out, payload);
          fs.close(fd).unwrap();
          fs.delete(&name).unwrap();
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  let status = fs.stat();
  assert!(status.files.is_empty());
  assert_eq!(status.blocks.used, 0);
  assert_eq!(status.inodes.used, 0);
  assert_eq!(status.open_files, 0);
}

#[test]
fn only_one_concurrent_writer_wins() {
  let fs = shared_fs();
  fs.create("contended").unwrap();
  let barrier = Arc::new(Barrier::new(THREADS));

  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let fs = Arc::clone(&fs);
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        fs.open("contended", AccessMode::ReadWrite)
      })
    })
    .collect();
  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  let winners = results.iter().filter(|r| r.is_ok()).count();
  assert_eq!(winners, 1);
  assert!(results
    .iter()
    .filter_map(|r| r.as_ref().err())
    .all(|err| *err == RsfsError::Busy));
  assert_eq!(fs.stat().open_files, 1);
}

#[test]
fn only_one_concurrent_create_wins() {
  let fs = shared_fs();
  let barrier = Arc::new(Barrier::new(THREADS));

  let handles: Vec<_> = (0..THREADS)
    .map(|_| {
      let fs = Arc::clone(&fs);
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        fs.create("same")
      })
    })
    .collect();
  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert_eq!(
    results.iter().filter(|r| **r == Err(RsfsError::AlreadyExists)).count(),
    THREADS - 1
  );
  let status = fs.stat();
  assert_eq!(status.files.len(), 1);
  assert_eq!(status.inodes.used, 1);
}

#[test]
fn shared_descriptor_serializes_writes() {
  let fs = shared_fs();
  fs.create("log").unwrap();
  let fd = fs.open("log", AccessMode::ReadWrite).unwrap();
  // 4 threads x 40 single byte writes fill the 160 byte maximum exactly.
  let writers = 4;
  let per_writer = 40;

  let handles: Vec<_> = (0..writers)
    .map(|i| {
      let fs = Arc::clone(&fs);
      thread::spawn(move || {
        for _ in 0..per_writer {
          assert_eq!(fs.write(fd, &[b'a' + i as u8]).unwrap(), 1);
        }
      })
    })
    .collect();
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(fs.stat().files[0].length, writers * per_writer);
  fs.fseek(fd, 0, Whence::Set).unwrap();
  let mut contents = vec![0u8; writers * per_writer];
  assert_eq!(fs.read(fd, &mut contents).unwrap(), contents.len());
  for i in 0..writers {
    let count = contents.iter().filter(|&&b| b == b'a' + i as u8).count();
    assert_eq!(count, per_writer);
  }
}

#[test]
fn readers_see_whole_chunks_while_writer_overwrites() {
  let fs = shared_fs();
  fs.create("data").unwrap();
  let writer = fs.open("data", AccessMode::ReadWrite).unwrap();
  fs.write(writer, &[0u8; 96]).unwrap();

  let write_handle = {
    let fs = Arc::clone(&fs);
    thread::spawn(move || {
      for round in 1..=50u8 {
        fs.fseek(writer, 0, Whence::Set).unwrap();
        assert_eq!(fs.write(writer, &[round; 96]).unwrap(), 96);
      }
    })
  };
  let read_handles: Vec<_> = (0..4)
    .map(|_| {
      let fs = Arc::clone(&fs);
      thread::spawn(move || {
        let fd = fs.open("data", AccessMode::ReadOnly).unwrap();
        for _ in 0..50 {
          fs.fseek(fd, 0, Whence::Set).unwrap();
          let mut buf = [0u8; 96];
          // Writes hold the inode exclusively, so a read never sees a torn write.
          assert_eq!(fs.read(fd, &mut buf).unwrap(), 96);
          assert!(buf.iter().all(|&b| b == buf[0]));
        }
        fs.close(fd).unwrap();
      })
    })
    .collect();

  write_handle.join().unwrap();
  for handle in read_handles {
    handle.join().unwrap();
  }
  assert_eq!(fs.stat().files[0].length, 96);
}

#[test]
fn delete_racing_open_leaves_consistent_state() {
  let fs = shared_fs();

  for _ in 0..50 {
    fs.create("racy").unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let opener = {
      let fs = Arc::clone(&fs);
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        barrier.wait();
        fs.open("racy", AccessMode::ReadOnly)
      })
    };
    barrier.wait();
    let deleted = fs.delete("racy");
    let opened = opener.join().unwrap();

    match (deleted, opened) {
      (Ok(()), Err(RsfsError::NotFound)) => {}
      (Err(RsfsError::Busy), Ok(fd)) => {
        fs.close(fd).unwrap();
        fs.delete("racy").unwrap();
      }
      other => panic!("unexpected outcome {:?}", other),
    }
    let status = fs.stat();
    assert!(status.files.is_empty());
    assert_eq!(status.inodes.used, 0);
  }
}

#[test]
fn stat_runs_alongside_writes_and_other_stats() {
  let fs = shared_fs();
  let max_len = fs.geometry().max_file_size();
  let done = Arc::new(AtomicBool::new(false));

  let writer = {
    let fs = Arc::clone(&fs);
    let done = Arc::clone(&done);
    thread::spawn(move || {
      for round in 0..50u8 {
        fs.create("busy").unwrap();
        let fd = fs.open("busy", AccessMode::ReadWrite).unwrap();
        for _ in 0..5 {
          assert_eq!(fs.write(fd, &[round; 32]).unwrap(), 32);
        }
        fs.close(fd).unwrap();
        fs.delete("busy").unwrap();
      }
      done.store(true, Ordering::SeqCst);
    })
  };
  let readers: Vec<_> = (0..4)
    .map(|_| {
      let fs = Arc::clone(&fs);
      let done = Arc::clone(&done);
      thread::spawn(move || {
        let mut snapshots = 0;
        while !done.load(Ordering::SeqCst) || snapshots < 10 {
          let status = fs.stat();
          assert!(status.blocks.used <= status.blocks.total);
          assert!(status.inodes.used <= status.inodes.total);
          assert!(status.open_files <= 1);
          assert!(status.files.len() <= 1);
          assert!(status.files.iter().all(|f| f.length <= max_len));
          snapshots += 1;
        }
      })
    })
    .collect();

  writer.join().unwrap();
  for handle in readers {
    handle.join().unwrap();
  }
  let status = fs.stat();
  assert!(status.files.is_empty());
  assert_eq!(status.blocks.used, 0);
  assert_eq!(status.inodes.used, 0);
}
