use std::cell::RefCell;
use std::fmt::Write as _;
use std::hash::Hash;

/// 可作為快取鍵識別碼的類型
///
/// 字串原樣輸出，整數以十進位輸出，其他類型使用 `Display`。
pub trait CacheId: Clone + Eq + Hash + Send + Sync + 'static {
    /// 將識別碼寫入鍵構建器
    fn write_id(&self, builder: &mut KeyBuilder);
}

impl CacheId for String {
    fn write_id(&self, builder: &mut KeyBuilder) {
        builder.push_str(self);
    }
}

impl CacheId for &'static str {
    fn write_id(&self, builder: &mut KeyBuilder) {
        builder.push_str(self);
    }
}

macro_rules! impl_integer_id {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheId for $ty {
                fn write_id(&self, builder: &mut KeyBuilder) {
                    builder.push_integer(*self);
                }
            }
        )*
    };
}

impl_integer_id!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! impl_display_id {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheId for $ty {
                fn write_id(&self, builder: &mut KeyBuilder) {
                    builder.push_display(self);
                }
            }
        )*
    };
}

impl_display_id!(uuid::Uuid, char, bool);

/// 快取鍵構建器，重用內部緩衝區以減少分配
pub struct KeyBuilder {
    buffer: String,
    itoa_buffer: itoa::Buffer,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self {
            buffer: String::with_capacity(64),
            itoa_buffer: itoa::Buffer::new(),
        }
    }

    pub fn push_str(&mut self, value: &str) {
        self.buffer.push_str(value);
    }

    pub fn push_integer<I: itoa::Integer>(&mut self, value: I) {
        self.buffer.push_str(self.itoa_buffer.format(value));
    }

    pub fn push_display<D: std::fmt::Display + ?Sized>(&mut self, value: &D) {
        // 寫入 String 不會失敗
        let _ = write!(self.buffer, "{}", value);
    }

    /// 構建 `prefix:id` 形式的鍵
    pub fn build<ID: CacheId>(&mut self, prefix: &str, id: &ID) -> &str {
        self.buffer.clear();
        self.buffer.push_str(prefix);
        self.buffer.push(':');
        id.write_id(self);
        &self.buffer
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static KEY_BUILDER: RefCell<KeyBuilder> = RefCell::new(KeyBuilder::new());
}

/// 由前綴與識別碼生成快取鍵
///
/// 使用 thread_local 重用內部緩衝區，適合高頻調用場景。
/// 相同的 (prefix, id) 永遠產生相同的鍵。
pub fn build_key<ID: CacheId>(prefix: &str, id: &ID) -> String {
    KEY_BUILDER.with(|builder| builder.borrow_mut().build(prefix, id).to_owned())
}
