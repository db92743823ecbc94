//! Server-rendered pages: login form and dashboard.
//!
//! Both pages talk to the JSON API with `fetch`; the server only renders the
//! shell and the signed-in username.

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #f5f5f5; color: #333;
        display: flex; justify-content: center; align-items: center;
        min-height: 100vh; padding: 20px;
    }
    .card {
        background: #fff; border-radius: 16px; padding: 32px;
        max-width: 420px; width: 100%; box-shadow: 0 4px 24px rgba(0,0,0,0.08);
    }
    .logo { text-align: center; margin-bottom: 24px; }
    .logo h1 { font-size: 28px; color: #1a1a2e; }
    .logo p { font-size: 14px; color: #666; margin-top: 4px; }
    .form-group { margin-bottom: 16px; }
    .form-group label { display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #444; }
    .form-group input {
        width: 100%; padding: 12px 14px; border: 1.5px solid #ddd;
        border-radius: 10px; font-size: 16px; outline: none; transition: border-color 0.2s;
    }
    .form-group input:focus { border-color: #4a6cf7; }
    .btn {
        width: 100%; padding: 14px; border: none; border-radius: 10px;
        font-size: 16px; font-weight: 600; cursor: pointer; transition: background 0.2s;
    }
    .btn-primary { background: #4a6cf7; color: #fff; }
    .btn-primary:hover { background: #3b5de7; }
    .error { background: #fff0f0; color: #d32f2f; padding: 10px 14px; border-radius: 8px; font-size: 13px; margin-bottom: 16px; }
    .result { background: #f0f4ff; padding: 14px; border-radius: 10px; font-size: 14px; margin-top: 16px; }
    .hidden { display: none; }
    .link { text-align: center; margin-top: 16px; font-size: 14px; color: #666; }
    .link a { color: #4a6cf7; text-decoration: none; }
    .link a:hover { text-decoration: underline; }
    "#
}

pub fn render_login_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>BioFace - Login</title>
<style>{style}</style>
</head><body>
<div class="card">
  <div class="logo"><h1>BioFace</h1><p>Sign in</p></div>
  <div id="error" class="error hidden"></div>
  <form id="login-form">
    <div class="form-group">
      <label for="username">Username</label>
      <input type="text" id="username" name="username" required autocomplete="username">
    </div>
    <div class="form-group">
      <label for="password">Password</label>
      <input type="password" id="password" name="password" required autocomplete="current-password">
    </div>
    <button type="submit" class="btn btn-primary">Login</button>
  </form>
</div>
<script>
document.getElementById('login-form').addEventListener('submit', async (event) => {{
  event.preventDefault();
  const error = document.getElementById('error');
  const res = await fetch('/api/login', {{
    method: 'POST',
    headers: {{ 'Content-Type': 'application/json' }},
    body: JSON.stringify({{
      username: document.getElementById('username').value,
      password: document.getElementById('password').value,
    }}),
  }});
  const data = await res.json();
  if (data.success) {{
    window.location.href = '/dashboard';
  }} else {{
    error.textContent = data.message || 'Login failed.';
    error.classList.remove('hidden');
  }}
}});
</script>
</body></html>"#,
        style = base_style(),
    )
}

pub fn render_dashboard(username: &str) -> String {
    let username = escape_html(username);
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>BioFace - Dashboard</title>
<style>{style}</style>
</head><body>
<div class="card">
  <div class="logo"><h1>BioFace</h1><p>Welcome, <strong id="user">{username}</strong></p></div>
  <form id="analysis-form">
    <div class="form-group">
      <label for="image">Face image</label>
      <input type="file" id="image" name="image" accept="image/*" required>
    </div>
    <button type="submit" class="btn btn-primary">Analyze</button>
  </form>
  <div id="result" class="result hidden"></div>
  <div class="link"><a href="/logout">Logout</a></div>
</div>
<script>
document.getElementById('analysis-form').addEventListener('submit', async (event) => {{
  event.preventDefault();
  const result = document.getElementById('result');
  const body = new FormData();
  body.append('image', document.getElementById('image').files[0]);
  const res = await fetch('/api/face-analysis', {{ method: 'POST', body }});
  const data = await res.json();
  result.textContent = data.error
    ? 'Error: ' + data.error
    : data.analysis + ' (faces detected: ' + data.faces_detected + ')';
  result.classList.remove('hidden');
}});
</script>
</body></html>"#,
        style = base_style(),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
