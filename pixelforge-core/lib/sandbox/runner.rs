//! Staging of the runner shim and candidate code into a scratch directory.
//!
//! The runner is the trusted side of the sandbox boundary: it loads the
//! candidate module, replays the serialized request against a minimal
//! request/response surface, captures every write to that surface, and prints
//! exactly one delimited marker line. The candidate code never sees the real
//! process arguments or environment, only the shimmed `req`/`res` pair.

use std::path::Path;

use tokio::fs;

use crate::{sandbox::SandboxRequest, PixelforgeResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Filename the candidate code is staged as
pub(crate) const CODE_FILENAME: &str = "code.js";

/// Filename the serialized request is staged as
pub(crate) const REQUEST_FILENAME: &str = "request.json";

/// Filename the runner shim is staged as
pub(crate) const RUNNER_FILENAME: &str = "runner.js";

/// The runner shim. The body is base64-encoded before the marker line is
/// printed, so the result line can never contain the marker token or a raw
/// newline regardless of what the candidate code writes.
const RUNNER_JS: &str = r#"'use strict';
const fs = require('fs');
const path = require('path');

const MARKER = '__SANDBOX_RESULT__';

function finish(statusCode, headers, bodyBuffer) {
  const result = {
    statusCode: statusCode,
    headers: headers,
    body: Buffer.from(bodyBuffer).toString('base64'),
  };
  process.stdout.write(MARKER + JSON.stringify(result) + '\n');
  process.exit(0);
}

let request;
try {
  request = JSON.parse(fs.readFileSync(path.join(__dirname, 'request.json'), 'utf8'));
} catch (err) {
  console.error('failed to read request: ' + err.message);
  process.exit(1);
}

let handler;
try {
  handler = require(path.join(__dirname, 'code.js'));
} catch (err) {
  console.error('failed to load candidate code: ' + err.message);
  process.exit(1);
}
if (handler && typeof handler.handler === 'function') handler = handler.handler;
if (typeof handler !== 'function') {
  console.error('candidate code does not export a handler function');
  process.exit(1);
}

const headers = request.headers || {};
let body = request.body === null || request.body === undefined ? undefined : request.body;
const contentType = String(headers['content-type'] || headers['Content-Type'] || '');
if (typeof body === 'string' && contentType.toLowerCase().includes('application/json')) {
  try { body = JSON.parse(body); } catch (ignored) {}
}

const req = {
  method: request.method,
  url: request.path,
  headers: headers,
  body: body,
};

const chunks = [];
const res = {
  statusCode: 200,
  headers: {},
  setHeader(name, value) {
    this.headers[String(name).toLowerCase()] = String(value);
  },
  writeHead(status, extra) {
    this.statusCode = status;
    for (const key of Object.keys(extra || {})) {
      this.headers[String(key).toLowerCase()] = String(extra[key]);
    }
  },
  write(chunk) {
    chunks.push(Buffer.from(chunk));
  },
  end(chunk) {
    if (chunk !== undefined && chunk !== null) chunks.push(Buffer.from(chunk));
    finish(this.statusCode, this.headers, Buffer.concat(chunks));
  },
  json(value) {
    this.headers['content-type'] = 'application/json';
    this.end(JSON.stringify(value));
  },
};

Promise.resolve()
  .then(() => handler(req, res))
  .catch((err) => {
    console.error('handler threw: ' + (err && err.message ? err.message : String(err)));
    process.exit(1);
  });
"#;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Writes the candidate code, the serialized request, and the runner shim
/// into the scratch directory.
pub(crate) async fn stage_call(
    scratch: &Path,
    code: &str,
    request: &SandboxRequest,
) -> PixelforgeResult<()> {
    fs::write(scratch.join(CODE_FILENAME), code).await?;
    fs::write(
        scratch.join(REQUEST_FILENAME),
        serde_json::to_vec(request)?,
    )
    .await?;
    fs::write(scratch.join(RUNNER_FILENAME), RUNNER_JS).await?;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_prints_marker_token() {
        // The shim must print the exact token the parser scans for.
        assert!(RUNNER_JS.contains(pixelforge_utils::SANDBOX_RESULT_MARKER));
    }

    #[tokio::test]
    async fn test_stage_call_writes_all_files() {
        let scratch = tempfile::tempdir().unwrap();
        let request = SandboxRequest::get("/");

        stage_call(scratch.path(), "module.exports = () => {};", &request)
            .await
            .unwrap();

        assert!(scratch.path().join(CODE_FILENAME).is_file());
        assert!(scratch.path().join(RUNNER_FILENAME).is_file());

        let staged = std::fs::read_to_string(scratch.path().join(REQUEST_FILENAME)).unwrap();
        let parsed: SandboxRequest = serde_json::from_str(&staged).unwrap();
        assert_eq!(parsed.method, "GET");
        assert_eq!(parsed.path, "/");
    }
}
