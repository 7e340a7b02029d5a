//! Java host binding
//!
//! [`JavaRuntime`] attaches engine threads to the JVM and [`JavaFrameSink`]
//! hands each frame to a Java object as a direct `ByteBuffer`:
//!
//! ```java
//! void onRawFrame(java.nio.ByteBuffer frame, int width, int height)
//! ```
//!
//! The buffer wraps the session's native memory and is only valid during
//! the call; the Java side must copy what it keeps.

use jni::objects::{GlobalRef, JObject, JValue};
use jni::{JNIEnv, JavaVM};

use crate::error::{HostError, SinkError};

use super::{FrameSink, FrameView, HostRuntime};

const ON_RAW_FRAME: &str = "onRawFrame";
const ON_RAW_FRAME_SIG: &str = "(Ljava/nio/ByteBuffer;II)V";

/// Host runtime backed by a `JavaVM`
pub struct JavaRuntime {
    vm: JavaVM,
}

impl JavaRuntime {
    pub fn new(vm: JavaVM) -> Self {
        Self { vm }
    }

    /// Runtime for the VM that owns `env`
    pub fn from_env(env: &JNIEnv<'_>) -> jni::errors::Result<Self> {
        Ok(Self::new(env.get_java_vm()?))
    }

    pub fn vm(&self) -> &JavaVM {
        &self.vm
    }
}

impl HostRuntime for JavaRuntime {
    fn is_current_thread_attached(&self) -> bool {
        self.vm.get_env().is_ok()
    }

    fn attach_current_thread(&self) -> Result<(), HostError> {
        self.vm
            .attach_current_thread_permanently()
            .map(|_| ())
            .map_err(|e| HostError::Unreachable(format!("Failed to attach JNI thread: {}", e)))
    }

    fn detach_current_thread(&self) {
        // SAFETY: only called by AttachGuard after it attached this thread
        // itself, and no local references created during the delivery
        // outlive it.
        unsafe { self.vm.detach_current_thread() }
    }
}

/// Frame sink calling `onRawFrame` on a Java object
pub struct JavaFrameSink {
    vm: JavaVM,
    hub: GlobalRef,
}

impl JavaFrameSink {
    /// Hold a global reference to `hub` for the lifetime of the sink
    pub fn new(env: &mut JNIEnv<'_>, hub: &JObject<'_>) -> jni::errors::Result<Self> {
        Ok(Self {
            vm: env.get_java_vm()?,
            hub: env.new_global_ref(hub)?,
        })
    }
}

impl FrameSink for JavaFrameSink {
    fn on_raw_frame(&self, frame: FrameView<'_>) -> Result<(), SinkError> {
        let mut env = self
            .vm
            .get_env()
            .map_err(|e| SinkError::new(format!("No JNI env on this thread: {}", e)))?;

        let data = frame.data();
        // SAFETY: the ByteBuffer is handed to Java for the duration of the
        // call only and the callee contract is read-only access; the local
        // reference is deleted before the frame borrow ends.
        let buffer = unsafe { env.new_direct_byte_buffer(data.as_ptr() as *mut u8, data.len()) }
            .map_err(|e| SinkError::new(format!("Failed to wrap frame: {}", e)))?;

        let result = env.call_method(
            &self.hub,
            ON_RAW_FRAME,
            ON_RAW_FRAME_SIG,
            &[
                JValue::Object(&buffer),
                JValue::Int(frame.width() as i32),
                JValue::Int(frame.height() as i32),
            ],
        );

        if env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }
        let _ = env.delete_local_ref(buffer);

        result
            .map(|_| ())
            .map_err(|e| SinkError::new(format!("onRawFrame failed: {}", e)))
    }
}
