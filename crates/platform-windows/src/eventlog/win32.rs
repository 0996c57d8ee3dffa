//! `OpenEventLogW` / `ReadEventLogW` binding.

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{
    ERROR_HANDLE_EOF, ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER,
};
use windows::Win32::System::EventLog::{
    CloseEventLog, GetNumberOfEventLogRecords, GetOldestEventLogRecord, OpenEventLogW,
    ReadEventLogW, EVENTLOG_FORWARDS_READ, EVENTLOG_HANDLE, EVENTLOG_SEEK_READ,
};

use super::reader::{RawLogApi, RawRead};
use super::{EventLogError, EventLogResult};

pub struct Win32EventLog {
    handle: EVENTLOG_HANDLE,
    log_name: String,
}

// The handle is only used through &self calls that the OS serialises.
unsafe impl Send for Win32EventLog {}

impl Win32EventLog {
    pub fn open(log_name: &str) -> EventLogResult<Self> {
        let name = HSTRING::from(log_name);
        // SAFETY: `name` outlives the call; a null server name means the local machine.
        let handle = unsafe { OpenEventLogW(PCWSTR::null(), &name) }
            .map_err(|err| EventLogError::LogUnavailable(format!("{log_name}: {err}")))?;
        tracing::info!(log_name, "opened security event log");
        Ok(Self {
            handle,
            log_name: log_name.to_string(),
        })
    }
}

impl RawLogApi for Win32EventLog {
    fn event_count(&self) -> EventLogResult<u32> {
        let mut count = 0u32;
        // SAFETY: handle is open for the lifetime of self.
        unsafe { GetNumberOfEventLogRecords(self.handle, &mut count) }
            .map_err(|err| EventLogError::LogReadError(format!("{}: {err}", self.log_name)))?;
        Ok(count)
    }

    fn oldest_record_number(&self) -> EventLogResult<u32> {
        let mut oldest = 0u32;
        // SAFETY: handle is open for the lifetime of self.
        unsafe { GetOldestEventLogRecord(self.handle, &mut oldest) }
            .map_err(|err| EventLogError::LogReadError(format!("{}: {err}", self.log_name)))?;
        Ok(oldest)
    }

    fn seek_read(&self, record_number: u32, buf: &mut [u8]) -> RawRead {
        let mut read = 0u32;
        let mut needed = 0u32;
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        // SAFETY: buf is valid for `len` bytes and exclusively borrowed.
        let result = unsafe {
            ReadEventLogW(
                self.handle,
                EVENTLOG_SEEK_READ | EVENTLOG_FORWARDS_READ,
                record_number,
                buf.as_mut_ptr().cast(),
                len,
                &mut read,
                &mut needed,
            )
        };

        match result {
            Ok(()) => RawRead::Filled(read as usize),
            Err(err) if err.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => {
                RawRead::BufferTooSmall(needed)
            }
            Err(err) if err.code() == ERROR_HANDLE_EOF.to_hresult() => RawRead::EndOfLog,
            // Seeking past the newest record reports an invalid offset.
            Err(err) if err.code() == ERROR_INVALID_PARAMETER.to_hresult() => RawRead::EndOfLog,
            Err(err) => RawRead::Failed(format!("{}: {err}", self.log_name)),
        }
    }
}

impl Drop for Win32EventLog {
    fn drop(&mut self) {
        // SAFETY: handle came from OpenEventLogW and is closed exactly once.
        if let Err(err) = unsafe { CloseEventLog(self.handle) } {
            tracing::warn!(log_name = %self.log_name, error = %err, "failed closing event log");
        }
    }
}
