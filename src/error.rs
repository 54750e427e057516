// Copyright 2026 graniteq developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// a single record's serialized form cannot fit in one segment;
    /// not retriable without splitting or rejecting the message
    #[error("message too large: {0}")]
    MessageTooLarge(String),

    /// read on an empty log, or past the last assigned offset
    #[error("none message")]
    NoMessages,

    /// marker error: a read ran past the end of one segment and the
    /// caller must advance to the next; never escapes the partition log
    #[error("end of segment {0}")]
    EndOfSegment(u64),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("corrupt message: {0}")]
    CorruptMessage(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    DetailedIoError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),
}
