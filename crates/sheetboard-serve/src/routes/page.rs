//! The board page: one HTML document that drives the JSON API.

use axum::extract::State;
use axum::response::IntoResponse;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use sheetboard_core::PageSize;

use crate::state::AppState;

/// Render the board page.
pub async fn board_page(State(state): State<AppState>) -> impl IntoResponse {
    let title = state.config.title.clone();
    let current = state.board.display_settings().posts_per_page;
    render(&title, current)
}

fn render(title: &str, current: PageSize) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(PAGE_CSS)) }
            }
            body {
                header class="bar" {
                    h1 { (title) }
                    div class="bar-tools" {
                        label for="page-size" { "Posts per page" }
                        select id="page-size" {
                            @for n in PageSize::ALLOWED {
                                option value=(n) selected[n == current.get()] { (n) }
                            }
                        }
                        button id="unlock" type="button" { "Edit mode" }
                    }
                }

                main {
                    section id="editor" class="card hidden" {
                        input id="post-id" type="hidden";
                        input id="post-name" type="text" placeholder="Title";
                        div id="post-text" class="text" contenteditable="true" {}
                        div class="editor-tools" {
                            label class="file" { "Image" input id="image-input" type="file" accept="image/*"; }
                            label class="file" { "Attachment" input id="file-input" type="file"; }
                            button id="draft" type="button" { "Draft with AI" }
                            span class="spacer" {}
                            button id="cancel" type="button" { "Cancel" }
                            button id="save" type="button" class="primary" { "Post" }
                        }
                        p id="status" class="status" {}
                    }

                    section id="posts" {}
                    nav id="pager" class="pager" {}
                }

                script { (PreEscaped(PAGE_JS)) }
            }
        }
    }
}

const PAGE_CSS: &str = r#"
:root{--fg:#1d1d1f;--fg2:#555;--fg3:#888;--bg:#fafafa;--card:#fff;--border:#e3e3e3;--accent:#2563eb}
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:system-ui,-apple-system,sans-serif;background:var(--bg);color:var(--fg);line-height:1.55}
.bar{display:flex;align-items:center;justify-content:space-between;gap:1rem;padding:1rem 1.5rem;border-bottom:1px solid var(--border);background:var(--card)}
.bar h1{font-size:1.3rem;font-weight:700}
.bar-tools{display:flex;align-items:center;gap:.5rem;font-size:.9rem;color:var(--fg2)}
main{max-width:760px;margin:1.5rem auto;padding:0 1rem}
.card{background:var(--card);border:1px solid var(--border);border-radius:8px;padding:1rem 1.25rem;margin-bottom:1rem}
.card h2{font-size:1.1rem;margin-bottom:.25rem}
.meta{font-size:.8rem;color:var(--fg3);margin-bottom:.5rem}
.text{min-height:6rem}
.text img{max-width:100%}
#editor input[type=text]{width:100%;font-size:1.05rem;padding:.4rem;border:1px solid var(--border);border-radius:4px;margin-bottom:.5rem}
#editor .text{border:1px solid var(--border);border-radius:4px;padding:.5rem}
.editor-tools{display:flex;align-items:center;gap:.5rem;margin-top:.5rem}
.file input{display:none}
.file,button{font-size:.85rem;padding:.35rem .7rem;border:1px solid var(--border);border-radius:4px;background:var(--card);cursor:pointer}
button.primary{background:var(--accent);border-color:var(--accent);color:#fff}
.spacer{flex:1}
.status{font-size:.85rem;color:var(--fg2);margin-top:.5rem;min-height:1.2em}
.actions{display:flex;gap:.5rem;margin-top:.75rem}
.pager{display:flex;justify-content:center;gap:.25rem;margin:1.5rem 0}
.pager button[disabled]{background:var(--accent);color:#fff;border-color:var(--accent)}
.hidden,.locked .actions,.locked #editor{display:none}
"#;

const PAGE_JS: &str = r#"
const state = { page: 1, password: null, posts: [] };
const $ = (id) => document.getElementById(id);

async function api(method, path, body) {
  const res = await fetch(path, {
    method,
    headers: { 'content-type': 'application/json' },
    body: body === undefined ? undefined : JSON.stringify(body),
  });
  const data = await res.json();
  if (!res.ok) throw new Error(data.message || res.statusText);
  return data;
}

function setStatus(msg) { $('status').textContent = msg || ''; }

function fmtDate(iso) { return new Date(iso).toLocaleString(); }

async function load(page) {
  const data = await api('GET', '/api/posts?page=' + page);
  state.page = data.pagination.currentPage;
  state.posts = data.posts;
  const list = $('posts');
  list.replaceChildren();
  for (const post of data.posts) {
    const card = document.createElement('article');
    card.className = 'card';
    const h = document.createElement('h2');
    h.textContent = post.name;
    const meta = document.createElement('div');
    meta.className = 'meta';
    meta.textContent = '#' + post.id + ' · ' + fmtDate(post.createdAt) +
      (post.updatedAt !== post.createdAt ? ' (edited ' + fmtDate(post.updatedAt) + ')' : '');
    const text = document.createElement('div');
    text.className = 'text';
    text.innerHTML = post.text;
    const actions = document.createElement('div');
    actions.className = 'actions';
    const edit = document.createElement('button');
    edit.textContent = 'Edit';
    edit.onclick = () => openEditor(post);
    const del = document.createElement('button');
    del.textContent = 'Delete';
    del.onclick = () => remove(post.id);
    actions.append(edit, del);
    card.append(h, meta, text, actions);
    list.append(card);
  }
  const pager = $('pager');
  pager.replaceChildren();
  for (let i = 1; i <= data.pagination.totalPages; i++) {
    const b = document.createElement('button');
    b.textContent = i;
    b.disabled = i === state.page;
    b.onclick = () => load(i);
    pager.append(b);
  }
}

function openEditor(post) {
  $('editor').classList.remove('hidden');
  $('post-id').value = post ? post.id : '';
  $('post-name').value = post ? post.name : '';
  $('post-text').innerHTML = post ? post.text : '';
  setStatus('');
}

function closeEditor() { openEditor(null); }

async function save() {
  const id = $('post-id').value;
  const body = { name: $('post-name').value, text: $('post-text').innerHTML, password: state.password };
  try {
    if (id) await api('PUT', '/api/posts/' + id, body);
    else await api('POST', '/api/posts', body);
    closeEditor();
    await load(id ? state.page : 1);
  } catch (e) { setStatus(e.message); }
}

async function remove(id) {
  if (!confirm('Delete post #' + id + '?')) return;
  try {
    await api('DELETE', '/api/posts/' + id, { password: state.password });
    await load(state.page);
  } catch (e) { alert(e.message); }
}

function readDataUrl(file) {
  return new Promise((resolve, reject) => {
    const r = new FileReader();
    r.onload = () => resolve(r.result);
    r.onerror = () => reject(r.error);
    r.readAsDataURL(file);
  });
}

async function uploadImage(file) {
  setStatus('Uploading image...');
  const { imageUrl } = await api('POST', '/api/uploads/image', { dataUrl: await readDataUrl(file) });
  const img = document.createElement('img');
  img.src = imageUrl;
  $('post-text').append(img);
  setStatus('');
}

async function uploadFile(file) {
  setStatus('Uploading file...');
  const res = await api('POST', '/api/uploads/file', { fileName: file.name, dataUrl: await readDataUrl(file) });
  const a = document.createElement('a');
  a.href = res.fileUrl;
  a.textContent = res.fileName;
  a.target = '_blank';
  const p = document.createElement('p');
  p.append(a);
  $('post-text').append(p);
  setStatus('');
}

async function draft() {
  const input = $('post-text').innerText.trim();
  if (!input) return setStatus('Write a few notes first.');
  setStatus('Drafting...');
  const { text } = await api('POST', '/api/generate', { text: input });
  $('post-text').innerText = text;
  setStatus('');
}

async function unlock() {
  const password = prompt('Password');
  if (password === null) return;
  const { valid } = await api('POST', '/api/auth/verify', { password });
  if (!valid) return alert('Incorrect password');
  state.password = password;
  document.body.classList.remove('locked');
  openEditor(null);
}

function guard(fn) { return (...args) => fn(...args).catch((e) => setStatus(e.message)); }

document.body.classList.add('locked');
$('unlock').onclick = guard(unlock);
$('save').onclick = guard(save);
$('cancel').onclick = closeEditor;
$('draft').onclick = guard(draft);
$('image-input').onchange = guard(async (e) => { if (e.target.files[0]) await uploadImage(e.target.files[0]); e.target.value = ''; });
$('file-input').onchange = guard(async (e) => { if (e.target.files[0]) await uploadFile(e.target.files[0]); e.target.value = ''; });
$('page-size').onchange = guard(async (e) => {
  await api('PUT', '/api/settings/page-size', { postsPerPage: Number(e.target.value) });
  await load(1);
});
load(1).catch((e) => { $('posts').textContent = e.message; });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_escapes_title_and_selects_page_size() {
        let html = render("<Notices>", PageSize::try_from(20).unwrap()).into_string();
        assert!(html.contains("&lt;Notices&gt;"));
        assert!(html.contains(r#"<option value="20" selected>"#));
        assert!(html.contains(r#"<option value="5">"#));
    }
}
