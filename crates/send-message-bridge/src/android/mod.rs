// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Each trait method invokes the corresponding
// Android API through JNI calls into the ART runtime.
//
// ## Architecture notes
//
// Only framework classes are used (no androidx), since classes looked up
// from a native thread resolve through the system class loader.
//
// `request_precondition` and `perform_send` start asynchronous flows. The
// host Activity must forward `onRequestPermissionsResult` to
// `SmsPlugin::on_request_permissions_result` and register a receiver for the
// configured sent action that forwards the action, `getResultCode()` and the
// `OP_ID_EXTRA` string extra to `SmsPlugin::on_sent_broadcast`.

#![cfg(target_os = "android")]

use jni::JNIEnv;
use jni::JavaVM;
use jni::objects::{JObject, JString, JValue};

use send_message_core::BridgeConfig;
use send_message_core::error::{Result, SmsError};
use send_message_core::types::{OP_ID_EXTRA, OperationId, split_recipients};

use crate::traits::SmsPlatform;

const SEND_SMS_PERMISSION: &str = "android.permission.SEND_SMS";
const FEATURE_TELEPHONY: &str = "android.hardware.telephony";
const ACTION_SENDTO: &str = "android.intent.action.SENDTO";
const EXTRA_TEXT: &str = "android.intent.extra.TEXT";

/// `PackageManager.PERMISSION_GRANTED`.
const PERMISSION_GRANTED: i32 = 0;
/// `PendingIntent.FLAG_IMMUTABLE`.
const FLAG_IMMUTABLE: i32 = 0x0400_0000;
/// `PendingIntent.FLAG_UPDATE_CURRENT`.
const FLAG_UPDATE_CURRENT: i32 = 0x0800_0000;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Obtain the process `JavaVM` from the global Android context.
///
/// `ndk_context::android_context()` holds the `JavaVM*` set by
/// `android_main` or `ANativeActivity_onCreate`.
fn java_vm() -> Result<JavaVM> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| SmsError::Bridge(format!("failed to obtain JavaVM: {e}")))
}

/// Obtain the hosting `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(SmsError::NoActivityContext);
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Convenience: map any `jni::errors::Error` into `SmsError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> SmsError {
    SmsError::Bridge(format!("{context}: {e}"))
}

/// Attach the current thread, look up the Activity and run `f`.
///
/// A Java exception left pending by `f` is logged and cleared so the next
/// JNI call on this thread starts clean.
fn with_activity<T>(f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'static>) -> Result<T>) -> Result<T> {
    let vm = java_vm()?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| jni_err("attach_current_thread", e))?;
    let activity = activity()?;

    let result = f(&mut *env, &activity);
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
    result
}

/// `Uri.parse(text)`.
fn parse_uri<'local>(env: &mut JNIEnv<'local>, text: &str) -> Result<JObject<'local>> {
    let j_text: JString = env
        .new_string(text)
        .map_err(|e| jni_err("new_string(uri)", e))?;
    env.call_static_method(
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        &[JValue::Object(&j_text)],
    )
    .map_err(|e| jni_err("Uri.parse", e))?
    .l()
    .map_err(|e| jni_err("Uri.parse->l", e))
}

/// `new Intent(action)`.
fn new_intent<'local>(env: &mut JNIEnv<'local>, action: &str) -> Result<JObject<'local>> {
    let j_action: JString = env
        .new_string(action)
        .map_err(|e| jni_err("new_string(action)", e))?;
    env.new_object(
        "android/content/Intent",
        "(Ljava/lang/String;)V",
        &[JValue::Object(&j_action)],
    )
    .map_err(|e| jni_err("new Intent", e))
}

/// `new Intent(ACTION_SENDTO).setData(Uri.parse(uri))`.
fn sendto_intent<'local>(env: &mut JNIEnv<'local>, uri: &str) -> Result<JObject<'local>> {
    let intent = new_intent(env, ACTION_SENDTO)?;
    let data = parse_uri(env, uri)?;
    env.call_method(
        &intent,
        "setData",
        "(Landroid/net/Uri;)Landroid/content/Intent;",
        &[JValue::Object(&data)],
    )
    .map_err(|e| jni_err("Intent.setData", e))?;
    Ok(intent)
}

// ---------------------------------------------------------------------------
// Platform struct
// ---------------------------------------------------------------------------

/// Android implementation of the SMS platform.
///
/// Holds only the bridge configuration; all other state lives on the Java
/// side.
pub struct AndroidPlatform {
    config: BridgeConfig,
}

impl AndroidPlatform {
    /// Create a new Android platform.
    ///
    /// This does **not** touch JNI; the first JNI call happens lazily when a
    /// trait method is invoked.
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    fn has_send_permission(&self) -> Result<bool> {
        with_activity(|env, activity| {
            let j_perm: JString = env
                .new_string(SEND_SMS_PERMISSION)
                .map_err(|e| jni_err("new_string(permission)", e))?;
            let status = env
                .call_method(
                    activity,
                    "checkSelfPermission",
                    "(Ljava/lang/String;)I",
                    &[JValue::Object(&j_perm)],
                )
                .map_err(|e| jni_err("checkSelfPermission", e))?
                .i()
                .map_err(|e| jni_err("checkSelfPermission->i", e))?;
            Ok(status == PERMISSION_GRANTED)
        })
    }

    fn show_permission_prompt(&self) -> Result<()> {
        let request_code = self.config.permission_request_code;
        with_activity(|env, activity| {
            let j_perm: JString = env
                .new_string(SEND_SMS_PERMISSION)
                .map_err(|e| jni_err("new_string(permission)", e))?;
            let perms = env
                .new_object_array(1, "java/lang/String", &j_perm)
                .map_err(|e| jni_err("new_object_array", e))?;

            env.call_method(
                activity,
                "requestPermissions",
                "([Ljava/lang/String;I)V",
                &[JValue::Object(&perms), JValue::Int(request_code)],
            )
            .map_err(|e| jni_err("requestPermissions", e))?;
            Ok(())
        })
    }

    /// Send through `SmsManager`. Returns the number of sent-broadcasts the
    /// platform will fire: one per part per recipient.
    fn send_direct(&self, id: OperationId, message: &str, recipients: &str) -> Result<usize> {
        let numbers = split_recipients(recipients, self.config.recipient_separator);
        if numbers.is_empty() {
            return Err(SmsError::InvalidArguments("no recipients".into()));
        }
        let multipart = self.config.needs_multipart(message);
        let sent_action = self.config.sent_action.as_str();

        with_activity(|env, activity| {
            // -- PendingIntent fired as the sent-broadcast -----------------------
            // Tagged with the operation id and registered under a request code
            // of its own, so broadcasts of an earlier send are told apart.
            let sent_broadcast = new_intent(env, sent_action)?;
            let j_key: JString = env
                .new_string(OP_ID_EXTRA)
                .map_err(|e| jni_err("new_string(op id key)", e))?;
            let j_id: JString = env
                .new_string(id.to_string())
                .map_err(|e| jni_err("new_string(op id)", e))?;
            env.call_method(
                &sent_broadcast,
                "putExtra",
                "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
                &[JValue::Object(&j_key), JValue::Object(&j_id)],
            )
            .map_err(|e| jni_err("putExtra(op id)", e))?;

            let sent_intent: JObject = env
                .call_static_method(
                    "android/app/PendingIntent",
                    "getBroadcast",
                    "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
                    &[
                        JValue::Object(activity),
                        JValue::Int(id.request_code()),
                        JValue::Object(&sent_broadcast),
                        JValue::Int(FLAG_IMMUTABLE | FLAG_UPDATE_CURRENT),
                    ],
                )
                .map_err(|e| jni_err("PendingIntent.getBroadcast", e))?
                .l()
                .map_err(|e| jni_err("getBroadcast->l", e))?;

            // -- SmsManager via getSystemService(SmsManager.class) ---------------
            let sms_class = env
                .find_class("android/telephony/SmsManager")
                .map_err(|_| SmsError::NoPlatformService)?;
            let sms_manager: JObject = env
                .call_method(
                    activity,
                    "getSystemService",
                    "(Ljava/lang/Class;)Ljava/lang/Object;",
                    &[JValue::Object(&sms_class)],
                )
                .map_err(|e| jni_err("getSystemService", e))?
                .l()
                .map_err(|e| jni_err("getSystemService->l", e))?;
            if sms_manager.is_null() {
                return Err(SmsError::NoPlatformService);
            }

            let j_message: JString = env
                .new_string(message)
                .map_err(|e| jni_err("new_string(message)", e))?;
            let null = JObject::null();

            // Multipart sends get the sent intent on every part.
            let multipart_payload = if multipart {
                let parts = env
                    .call_method(
                        &sms_manager,
                        "divideMessage",
                        "(Ljava/lang/String;)Ljava/util/ArrayList;",
                        &[JValue::Object(&j_message)],
                    )
                    .map_err(|e| jni_err("divideMessage", e))?
                    .l()
                    .map_err(|e| jni_err("divideMessage->l", e))?;
                let count = env
                    .call_method(&parts, "size", "()I", &[])
                    .map_err(|e| jni_err("ArrayList.size", e))?
                    .i()
                    .map_err(|e| jni_err("size->i", e))?;

                let sent_intents = env
                    .new_object("java/util/ArrayList", "(I)V", &[JValue::Int(count)])
                    .map_err(|e| jni_err("new ArrayList", e))?;
                for _ in 0..count {
                    env.call_method(
                        &sent_intents,
                        "add",
                        "(Ljava/lang/Object;)Z",
                        &[JValue::Object(&sent_intent)],
                    )
                    .map_err(|e| jni_err("ArrayList.add", e))?;
                }
                Some((parts, sent_intents, usize::try_from(count).unwrap_or(0)))
            } else {
                None
            };

            for number in &numbers {
                let j_number: JString = env
                    .new_string(*number)
                    .map_err(|e| jni_err("new_string(number)", e))?;

                match &multipart_payload {
                    Some((parts, sent_intents, _)) => {
                        env.call_method(
                            &sms_manager,
                            "sendMultipartTextMessage",
                            "(Ljava/lang/String;Ljava/lang/String;Ljava/util/ArrayList;Ljava/util/ArrayList;Ljava/util/ArrayList;)V",
                            &[
                                JValue::Object(&j_number),
                                JValue::Object(&null),
                                JValue::Object(parts),
                                JValue::Object(sent_intents),
                                JValue::Object(&null),
                            ],
                        )
                        .map_err(|e| jni_err("sendMultipartTextMessage", e))?;
                    }
                    None => {
                        env.call_method(
                            &sms_manager,
                            "sendTextMessage",
                            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Landroid/app/PendingIntent;Landroid/app/PendingIntent;)V",
                            &[
                                JValue::Object(&j_number),
                                JValue::Object(&null),
                                JValue::Object(&j_message),
                                JValue::Object(&sent_intent),
                                JValue::Object(&null),
                            ],
                        )
                        .map_err(|e| jni_err("sendTextMessage", e))?;
                    }
                }
                env.delete_local_ref(j_number)
                    .map_err(|e| jni_err("delete_local_ref", e))?;
            }

            let parts = multipart_payload.as_ref().map_or(1, |(_, _, count)| *count);
            let confirmations = numbers.len() * parts;
            tracing::info!(
                op_id = %id,
                recipients = numbers.len(),
                bytes = message.len(),
                parts,
                confirmations,
                "Android: SMS dispatched"
            );
            Ok(confirmations)
        })
    }

    fn open_compose(&self, message: &str, recipients: &str) -> Result<()> {
        let request_code = self.config.send_request_code;
        with_activity(|env, activity| {
            let intent = sendto_intent(env, &format!("smsto:{recipients}"))?;

            let j_message: JString = env
                .new_string(message)
                .map_err(|e| jni_err("new_string(message)", e))?;
            for key in ["sms_body", EXTRA_TEXT] {
                let j_key: JString = env
                    .new_string(key)
                    .map_err(|e| jni_err("new_string(extra key)", e))?;
                env.call_method(
                    &intent,
                    "putExtra",
                    "(Ljava/lang/String;Ljava/lang/String;)Landroid/content/Intent;",
                    &[JValue::Object(&j_key), JValue::Object(&j_message)],
                )
                .map_err(|e| jni_err("putExtra", e))?;
            }

            env.call_method(
                activity,
                "startActivityForResult",
                "(Landroid/content/Intent;I)V",
                &[JValue::Object(&intent), JValue::Int(request_code)],
            )
            .map_err(|e| jni_err("startActivityForResult(sms)", e))?;

            tracing::info!("Android: compose intent dispatched");
            Ok(())
        })
    }

    fn telephony_available(&self) -> Result<bool> {
        with_activity(|env, activity| {
            let package_manager: JObject = env
                .call_method(
                    activity,
                    "getPackageManager",
                    "()Landroid/content/pm/PackageManager;",
                    &[],
                )
                .map_err(|e| jni_err("getPackageManager", e))?
                .l()
                .map_err(|e| jni_err("getPackageManager->l", e))?;

            let j_feature: JString = env
                .new_string(FEATURE_TELEPHONY)
                .map_err(|e| jni_err("new_string(feature)", e))?;
            let has_telephony = env
                .call_method(
                    &package_manager,
                    "hasSystemFeature",
                    "(Ljava/lang/String;)Z",
                    &[JValue::Object(&j_feature)],
                )
                .map_err(|e| jni_err("hasSystemFeature", e))?
                .z()
                .map_err(|e| jni_err("hasSystemFeature->z", e))?;
            if !has_telephony {
                return Ok(false);
            }

            // Some exported activity must handle `smsto:`.
            let intent = sendto_intent(env, "smsto:")?;
            let flags = env
                .call_method(&intent, "getFlags", "()I", &[])
                .map_err(|e| jni_err("getFlags", e))?
                .i()
                .map_err(|e| jni_err("getFlags->i", e))?;
            let info: JObject = env
                .call_method(
                    &intent,
                    "resolveActivityInfo",
                    "(Landroid/content/pm/PackageManager;I)Landroid/content/pm/ActivityInfo;",
                    &[JValue::Object(&package_manager), JValue::Int(flags)],
                )
                .map_err(|e| jni_err("resolveActivityInfo", e))?
                .l()
                .map_err(|e| jni_err("resolveActivityInfo->l", e))?;
            if info.is_null() {
                return Ok(false);
            }

            env.get_field(&info, "exported", "Z")
                .map_err(|e| jni_err("ActivityInfo.exported", e))?
                .z()
                .map_err(|e| jni_err("exported->z", e))
        })
    }
}

impl SmsPlatform for AndroidPlatform {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn check_precondition(&self) -> bool {
        self.has_send_permission().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Android: permission check failed");
            false
        })
    }

    fn request_precondition(&self) -> Result<()> {
        self.show_permission_prompt()
    }

    fn perform_send(&self, id: OperationId, message: &str, recipients: &str) -> Result<usize> {
        self.send_direct(id, message, recipients)
    }

    fn send_via_dialog(&self, message: &str, recipients: &str) -> Result<()> {
        self.open_compose(message, recipients)
    }

    fn can_send_sms(&self) -> bool {
        self.telephony_available().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Android: telephony probe failed");
            false
        })
    }
}
