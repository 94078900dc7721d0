use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 备用文件名长度
pub const FALLBACK_NAME_LEN: usize = 8;

/// 文件名生成能力，源没有给出文件名或者创建文件失败时使用
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 随机字母文件名，可以指定种子以便测试
pub struct RandomNames {
    rng: Mutex<StdRng>,
}

impl RandomNames {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomNames {
    fn default() -> Self {
        Self::new()
    }
}

impl NameGenerator for RandomNames {
    fn generate(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..FALLBACK_NAME_LEN)
            .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
            .collect()
    }
}
