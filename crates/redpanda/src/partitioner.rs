//! Key routing for job records.

/// Partition for an email key.
///
/// FNV-1a over the lowercased key, so routing is stable across builds and
/// processes and every job for one email lands on one partition.
pub fn partition_for(email: &str, num_partitions: i32) -> i32 {
    if num_partitions <= 1 {
        return 0;
    }

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in email.to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % num_partitions as u64) as i32
}
