//! Synthetic username pool shared by the scenarios that log in.
//!
//! A run provisions `target_user_count` accounts named `<prefix><n>`
//! (n from 1). They are split across worker processes in contiguous
//! chunks, the first `U % W` workers taking one extra account each, and
//! every virtual user of a worker pops one name from its chunk. A worker
//! starts exactly as many virtual users as it holds names.

use std::sync::Mutex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker index {index} out of range for {count} workers")]
    WorkerOutOfRange { index: usize, count: usize },

    #[error("worker {index} has no users: {total} user(s) cannot cover {count} workers")]
    EmptyChunk {
        index: usize,
        count: usize,
        total: usize,
    },
}

pub fn generate_usernames(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|n| format!("{prefix}{n}")).collect()
}

/// Split `users` into `worker_count` chunks.
pub fn partition_users(
    users: &[String],
    worker_count: usize,
) -> Result<Vec<Vec<String>>, PartitionError> {
    if worker_count == 0 {
        return Err(PartitionError::NoWorkers);
    }

    let chunk = users.len() / worker_count;
    let leftover = users.len() % worker_count;

    let chunks = (0..worker_count)
        .map(|i| {
            let mut part = users[i * chunk..(i + 1) * chunk].to_vec();
            if i < leftover {
                part.push(users[worker_count * chunk + i].clone());
            }
            part
        })
        .collect();
    Ok(chunks)
}

/// Usernames assigned to worker `index` out of `count`. A worker runs one
/// virtual user per name, so it must get at least one.
pub fn worker_chunk(
    prefix: &str,
    target_user_count: usize,
    index: usize,
    count: usize,
) -> Result<Vec<String>, PartitionError> {
    if count == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if index >= count {
        return Err(PartitionError::WorkerOutOfRange { index, count });
    }
    let users = generate_usernames(prefix, target_user_count);
    let chunk = partition_users(&users, count)?.swap_remove(index);
    if chunk.is_empty() {
        return Err(PartitionError::EmptyChunk {
            index,
            count,
            total: target_user_count,
        });
    }
    Ok(chunk)
}

/// Local chunk consumed one name per virtual user.
#[derive(Debug)]
pub struct UserPool {
    fallback: String,
    names: Mutex<Vec<String>>,
}

impl UserPool {
    pub fn new(prefix: &str, names: Vec<String>) -> Self {
        Self {
            fallback: format!("{prefix}1"),
            names: Mutex::new(names),
        }
    }

    /// Take the next name from the back; `<prefix>1` once the pool is empty.
    pub fn pop(&self) -> String {
        let popped = match self.names.lock() {
            Ok(mut names) => names.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        popped.unwrap_or_else(|| self.fallback.clone())
    }

    pub fn remaining(&self) -> usize {
        match self.names.lock() {
            Ok(names) => names.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_cover_all_users() {
        for users in [0usize, 1, 7, 10, 23, 100] {
            for workers in 1..=6 {
                let names = generate_usernames("t", users);
                let chunks = partition_users(&names, workers).unwrap();
                assert_eq!(chunks.len(), workers);

                let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
                assert_eq!(sizes.iter().sum::<usize>(), users);
                let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
                assert!(max - min <= 1, "{users} users / {workers} workers: {sizes:?}");

                let mut all: Vec<String> = chunks.into_iter().flatten().collect();
                all.sort();
                let mut expected = names.clone();
                expected.sort();
                assert_eq!(all, expected);
            }
        }
    }

    #[test]
    fn test_leftovers_go_to_first_workers() {
        let names = generate_usernames("test", 7);
        let chunks = partition_users(&names, 3).unwrap();
        assert_eq!(chunks[0], vec!["test1", "test2", "test7"]);
        assert_eq!(chunks[1], vec!["test3", "test4"]);
        assert_eq!(chunks[2], vec!["test5", "test6"]);
    }

    #[test]
    fn test_worker_chunk_bounds() {
        assert_eq!(
            worker_chunk("t_", 10, 0, 0).unwrap_err(),
            PartitionError::NoWorkers
        );
        assert_eq!(
            worker_chunk("t_", 10, 2, 2).unwrap_err(),
            PartitionError::WorkerOutOfRange { index: 2, count: 2 }
        );
        assert_eq!(worker_chunk("t_", 3, 1, 2).unwrap(), vec!["t_2"]);
        assert_eq!(
            worker_chunk("t_", 1, 1, 2).unwrap_err(),
            PartitionError::EmptyChunk {
                index: 1,
                count: 2,
                total: 1
            }
        );
    }

    #[test]
    fn test_pool_pops_from_back_then_falls_back() {
        let pool = UserPool::new("t", vec!["t1".into(), "t2".into()]);
        assert_eq!(pool.pop(), "t2");
        assert_eq!(pool.pop(), "t1");
        assert_eq!(pool.remaining(), 0);
        assert_eq!(pool.pop(), "t1");
        assert_eq!(pool.pop(), "t1");
    }
}
